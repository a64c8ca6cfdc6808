use std::{
    fmt::Display,
    io,
    net::{SocketAddr, ToSocketAddrs},
};

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use log::{debug, info};
use tokio::{
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    runtime::Runtime,
};

use crate::{
    builder::WeightBlob,
    configs::{Adapter, JobDescriptor},
    engine::{Metric, TrainingEngine},
    error::{OrchestratorError, Result},
};

type NetRx = OnoReceiver<OwnedReadHalf>;
type NetTx = OnoSender<OwnedWriteHalf>;

/// A connection to a training engine node.
///
/// The session owns its own runtime so callers can drive the engine with
/// plain blocking calls.
pub struct Session {
    runtime: Runtime,
    rx: NetRx,
    tx: NetTx,
    rx_buf: Vec<u8>,
    adapter: Adapter,
}

impl Session {
    /// Connects to the engine listening at `addr`.
    ///
    /// # Errors
    /// Returns `OrchestratorError::ConnectionFailed` if the address can't be
    /// resolved or reached.
    pub fn connect<A: ToSocketAddrs + Display>(addr: A) -> Result<Self> {
        let name = addr.to_string();
        let failed = |source| OrchestratorError::ConnectionFailed {
            addr: name.clone(),
            source,
        };

        let addr: SocketAddr = addr.to_socket_addrs().map_err(failed)?.next().ok_or_else(|| {
            failed(io::Error::new(
                io::ErrorKind::InvalidInput,
                "could not resolve address",
            ))
        })?;

        let runtime = Runtime::new()?;
        let stream = runtime.block_on(TcpStream::connect(addr)).map_err(failed)?;
        info!("connected to training engine at {addr}");

        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);

        Ok(Self {
            runtime,
            rx,
            tx,
            rx_buf: Vec::new(),
            adapter: Adapter::new(),
        })
    }

    /// Tells the engine the session is over.
    pub fn disconnect(mut self) -> Result<()> {
        self.send(&Msg::Control(Command::Disconnect))
    }

    fn send(&mut self, msg: &Msg<'_>) -> Result<()> {
        self.runtime.block_on(self.tx.send(msg))?;
        Ok(())
    }

    fn recv_command(&mut self) -> Result<Command> {
        let Self {
            runtime,
            rx,
            rx_buf,
            ..
        } = self;

        match runtime.block_on(rx.recv_into(rx_buf))? {
            Msg::Control(cmd) => Ok(cmd),
            Msg::Err(reason) => Err(OrchestratorError::Engine(reason.into_owned())),
            Msg::Data(_) => Err(OrchestratorError::Engine(
                "received an unexpected data frame".into(),
            )),
        }
    }

    fn unexpected<T>(cmd: Command) -> Result<T> {
        Err(OrchestratorError::Engine(format!(
            "received an unexpected command {cmd:?}"
        )))
    }
}

impl TrainingEngine for Session {
    fn load_weights(&mut self, blob: &WeightBlob) -> Result<()> {
        debug!("sending {} bytes of initial weights", blob.len());
        self.send(&Msg::Data(Payload::Weights(blob.as_bytes())))?;
        self.send(&Msg::Control(Command::LoadWeights))
    }

    fn fit(&mut self, job: &JobDescriptor) -> Result<()> {
        let spec = self.adapter.adapt_job(job)?;
        self.send(&Msg::Control(Command::Fit(spec)))?;

        loop {
            match self.recv_command()? {
                Command::Progress { epoch, cost } => info!("epoch {epoch}: cost {cost:.4}"),
                Command::Finished => return Ok(()),
                cmd => return Self::unexpected(cmd),
            }
        }
    }

    fn evaluate(&mut self, metric: Metric) -> Result<f32> {
        let metric = self.adapter.adapt_metric(metric);
        self.send(&Msg::Control(Command::Evaluate { metric }))?;

        match self.recv_command()? {
            Command::Score { value } => Ok(value),
            cmd => Self::unexpected(cmd),
        }
    }
}
