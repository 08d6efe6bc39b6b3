//! The system abstraction.
//!
//! A system is user code executed once per tick against the live store. A
//! system struct typically carries [`Query`](crate::engine::query::Query)
//! and [`Singleton`](crate::engine::singleton::Singleton) descriptor fields
//! next to plain state fields; the plain fields persist untouched across
//! ticks while the descriptors are wired to the storage when the system is
//! registered.
//!
//! There is no runtime introspection of system fields. A system wires its
//! own descriptors explicitly in [`System::bind`], which the scheduler
//! calls exactly once at registration:
//!
//! ```ignore
//! struct Movement {
//!     entities: Query<(Write<Position>, Read<Velocity>)>,
//!     ticks: u64,
//! }
//!
//! impl System for Movement {
//!     fn bind(&mut self, storage: &mut Storage) {
//!         self.entities.bind(storage);
//!     }
//!
//!     fn execute(&mut self, frame: &mut Frame<'_>) {
//!         self.ticks += 1;
//!         for (_, (position, velocity)) in self.entities.iter(frame.storage) {
//!             position.x += velocity.dx * frame.delta_time as f32;
//!             position.y += velocity.dy * frame.delta_time as f32;
//!         }
//!     }
//! }
//! ```

use crate::engine::frame::Frame;
use crate::engine::storage::Storage;

/// A unit of logic executed once per tick, in registration order.
pub trait System {
    /// Wires the system's query and singleton descriptors to the storage.
    ///
    /// Called by the scheduler when the system is registered. The default
    /// implementation does nothing, for systems without descriptors.
    fn bind(&mut self, storage: &mut Storage) {
        let _ = storage;
    }

    /// Runs the system against the current frame.
    fn execute(&mut self, frame: &mut Frame<'_>);
}
