//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                         | Connects to             |
//! |------------|------------------------------------|-------------------------|
//! | `log_sink` | EventSink                          | `log` output            |
//! | `sim`      | Motor/Servo/Distance/Encoder/      | In-memory simulation    |
//! |            | Collision/Horn/Led ports           |                         |
//! | `video`    | VideoPort                          | Shell commands          |

pub mod log_sink;
pub mod sim;
pub mod video;
