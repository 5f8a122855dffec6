use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("No channel named [{0}]")]
    ChannelNotFound(String),

    #[error("Failed to send message {message} to destination [{destination}]")]
    SendFailed {
        destination: String,
        message: String,
        #[source]
        source: Box<MessagingError>,
    },

    #[error("Failed to receive a message from destination [{destination}]")]
    ReceiveFailed {
        destination: String,
        #[source]
        source: Box<MessagingError>,
    },

    #[error("Channel [{0}] is disconnected")]
    Disconnected(String),
}

pub type Result<T, E = MessagingError> = std::result::Result<T, E>;
