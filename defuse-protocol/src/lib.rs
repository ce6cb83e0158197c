//! # DefuseMe Protocol
//!
//! Serial line protocol between the DefuseMe game controller and its game
//! modules. The core builds without `std` so it runs on the module MCUs; the
//! `std` feature adds host links, sockets and logging helpers.
//!
//! ## Wire Format
//!
//! Newline-terminated lines of at most 79 bytes. A line either starts with a
//! command byte or carries plain `tag:value` fragments separated by spaces:
//! ```text
//! [cmd:u8][payload...]\n
//! sno:ABC123DEF456GHJ\n
//! ```
//!
//! ## Commands
//!
//! | Byte | Name | Direction | Payload |
//! |------|------|-----------|---------|
//! | 0x80 | ENUMERATE | both | module reply: `name:feature:data,...` |
//! | 0x81 | NEIGHBOUR | both | module reply: `name:feature:data,...` |
//! | 0x82 | SETTINGS | both | module reply: `name:feature:data,...` |
//! | 0x83 | GAME_STATUS | controller→module | `time:<ms> state:<0..3> strikes:<n>` |
//! | 0x83 | GAME_STATUS | module→controller | `name:state:<0|1|2>` |
//! | 0x84 | RESET | controller→module | empty |

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod clock;
pub mod command;
pub mod demo;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod framer;
pub mod line;
pub mod link;
pub mod module;
pub mod response;
pub mod state;
pub mod tagged;

#[cfg(feature = "std")]
pub mod host;
#[cfg(feature = "std")]
pub mod socket;

pub use clock::{Clock, StepClock};
pub use command::Command;
pub use demo::{DemoConfig, DemoTimer};
pub use descriptor::{FeatureTag, ModuleDescriptor, ModuleReport};
pub use dispatcher::{Action, Phase};
pub use error::{DispatchError, ModuleError, ParseError};
pub use framer::{Intake, LineFramer};
pub use line::Line;
pub use link::{NullLink, SerialLink};
pub use module::{DefuseModule, ModuleConfig, StrikePolicy};
pub use state::{GameState, ModuleState, State};
pub use tagged::TaggedValue;

#[cfg(feature = "std")]
pub use clock::SystemClock;
#[cfg(feature = "std")]
pub use error::LinkError;
#[cfg(feature = "std")]
pub use link::{LoopbackLink, WriteLink};
#[cfg(feature = "std")]
pub use socket::{SocketAddr, SocketConnection, SocketListener, SocketReader, SocketWriter};
