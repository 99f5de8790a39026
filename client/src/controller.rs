use tether_shared::Unit;

// Controller Trait
/// A client-side [`Unit`]. Controllers reach server services through the
/// [`ServiceDirectory`](crate::ServiceDirectory) found in their init and
/// start contexts.
pub trait Controller: Unit {}

impl<U: Unit> Controller for U {}
