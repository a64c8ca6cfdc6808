use std::{borrow::Cow, io};

use crate::{
    Deserialize, Serialize,
    specs::{JobSpec, MetricSpec},
};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

const ERR_H: Header = 0;
const CONTROL_H: Header = 1;
const WEIGHTS_H: Header = 2;

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug)]
pub enum Payload<'a> {
    /// An opaque serialized model state, only the engine knows its format.
    Weights(&'a [u8]),
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Restore the previously sent weights before fitting.
    LoadWeights,
    Fit(JobSpec),
    Progress { epoch: usize, cost: f32 },
    Finished,
    Evaluate { metric: MetricSpec },
    Score { value: f32 },
    Disconnect,
}

/// The application layer message for the entire system.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    fn buf_is_too_small<T>(size: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {HEADER_SIZE} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid kind header {kind}"),
        ))
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>> {
        match self {
            Msg::Err(e) => {
                buf.extend_from_slice(&ERR_H.to_be_bytes());
                Ok(Some(e.as_bytes()))
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL_H.to_be_bytes());
                serde_json::to_writer(buf, cmd)?;
                Ok(None)
            }
            Msg::Data(Payload::Weights(blob)) => {
                buf.extend_from_slice(&WEIGHTS_H.to_be_bytes());
                Ok(Some(*blob))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        let Some((kind_buf, rest)) = buf.split_first_chunk::<HEADER_SIZE>() else {
            return Self::buf_is_too_small(buf.len());
        };

        match Header::from_be_bytes(*kind_buf) {
            ERR_H => {
                let string = std::str::from_utf8(rest)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Err(Cow::Borrowed(string)))
            }
            CONTROL_H => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            WEIGHTS_H => Ok(Self::Data(Payload::Weights(rest))),
            kind => Self::invalid_kind(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(msg: &Msg<'_>) -> Vec<u8> {
        let mut buf = Vec::new();
        if let Some(tail) = msg.serialize(&mut buf).unwrap() {
            buf.extend_from_slice(tail);
        }
        buf
    }

    #[test]
    fn control_is_json_after_header() {
        let bytes = frame(&Msg::Control(Command::Score { value: 0.5 }));
        assert_eq!(&bytes[..HEADER_SIZE], &CONTROL_H.to_be_bytes());
        assert_eq!(&bytes[HEADER_SIZE..], br#"{"score":{"value":0.5}}"#);
    }

    #[test]
    fn unit_commands_are_plain_strings() {
        let bytes = frame(&Msg::Control(Command::Finished));
        assert_eq!(&bytes[HEADER_SIZE..], br#""finished""#);
    }

    #[test]
    fn weights_are_borrowed_from_the_frame() {
        let blob = [7u8, 0, 255, 3];
        let bytes = frame(&Msg::Data(Payload::Weights(&blob)));

        let Msg::Data(Payload::Weights(got)) = Msg::deserialize(&bytes).unwrap() else {
            panic!("expected a weights payload");
        };
        assert_eq!(got, blob);
    }

    #[test]
    fn err_carries_the_reason() {
        let bytes = frame(&Msg::Err(Cow::Borrowed("backend init failed")));

        let Msg::Err(reason) = Msg::deserialize(&bytes).unwrap() else {
            panic!("expected an error message");
        };
        assert_eq!(reason, "backend init failed");
    }

    #[test]
    fn rejects_unknown_kind() {
        let bytes = 9u32.to_be_bytes();
        let err = Msg::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(Msg::deserialize(&[0, 1]).is_err());
    }
}
