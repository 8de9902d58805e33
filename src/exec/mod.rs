pub mod order;
pub mod router;
pub mod venue;

pub use order::{ClientOrderId, Order, OrderResult, OrderStatus, OrderType, Side};
pub use router::OrderRouter;
pub use venue::{ExecutionVenue, LiveVenue, SimVenue, VenueError, VenueFill};
