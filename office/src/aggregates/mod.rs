//! Reducers for the back-office.
//!
//! - Booking: the lifecycle state machine and its persistence effects
//! - Inbox: the admin conversation list and selection

pub mod booking;
pub mod inbox;

pub use booking::{
    Booking, BookingAction, BookingError, BookingLifecycle, BookingReducer, BookingState,
    BookingTransition,
};
pub use inbox::{InboxAction, InboxEnvironment, InboxReducer, InboxState};
