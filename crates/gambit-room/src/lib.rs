//! Authoritative room state for Gambit.
//!
//! All of it lives in one dispatcher task (actor model): membership,
//! pending offers and the move relay are plain single-threaded structs
//! owned by a [`RoomStore`], and connection handlers reach them only
//! through a [`DispatcherHandle`].
//!
//! # Key types
//!
//! - [`SessionRegistry`]: rooms, seats, and colour by seat index
//! - [`OfferCoordinator`]: one pending undo/draw offer per room
//! - [`MoveRelay`]: forwards moves, letting offers react first
//! - [`RoomStore`]: the three above behind one injectable object
//! - [`Outcome`]: direct reply plus broadcasts, kept apart
//! - [`DispatcherHandle`]: send commands to the running dispatcher

mod config;
mod dispatcher;
mod error;
mod offer;
mod outcome;
mod registry;
mod relay;
mod store;

pub use config::{RoomConfig, RoomState};
pub use dispatcher::{DispatcherHandle, DispatcherStats, EventSender, spawn_dispatcher};
pub use error::RoomError;
pub use offer::{OfferCoordinator, PendingOffer, Proposal, Response};
pub use outcome::{Delivery, Outcome};
pub use registry::{Departure, Room, Seat, SessionRegistry};
pub use relay::MoveRelay;
pub use store::RoomStore;
