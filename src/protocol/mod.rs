// Protocol module: wire constants, client identifiers, and message classification

pub mod classifier;
pub mod messages;
pub mod types;

pub use classifier::{classify, ClassifiedMessage, DataChannelKind, DataChannelMessage};

pub use messages::{
    is_signaling_type, ServerNotice, BINARY_DATA_PREFIX, DATA_CHANNEL_MESSAGE_TYPE,
    SIGNALING_TYPES,
};

pub use types::{ClientId, CLIENT_ID_SUFFIX_LEN};
