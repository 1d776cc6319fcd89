use crate::hrtf::DatasetError;
use crate::reverb::LoadError;

#[derive(Debug, derive_more::Display, derive_more::IsVariant)]
enum ErrorPayload {
    #[display(fmt = "HRTF dataset error: {}", _0)]
    Dataset(DatasetError),

    #[display(fmt = "Impulse response error: {}", _0)]
    Load(LoadError),

    #[display(fmt = "Unable to start a background thread: {}", _0)]
    Thread(std::io::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{payload}")]
pub struct Error {
    payload: ErrorPayload,
}

macro_rules! conv {
    ($variant: ident, $from_err: path) => {
        impl From<$from_err> for Error {
            fn from(value: $from_err) -> Error {
                Error {
                    payload: ErrorPayload::$variant(value),
                }
            }
        }
    };
}

conv!(Dataset, DatasetError);
conv!(Load, LoadError);
conv!(Thread, std::io::Error);

impl Error {
    /// Was the HRTF dataset unusable?
    pub fn is_dataset(&self) -> bool {
        self.payload.is_dataset()
    }

    /// Did an impulse response fail to load?
    pub fn is_load(&self) -> bool {
        self.payload.is_load()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
