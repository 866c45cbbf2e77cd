//! Queue - pacing, retry, circuit breaking and event delivery.
//!
//! - **task_queue**: the public facade (`add` / `start` / `clear` / `on_*`)
//! - **state**: synchronous phase machine, the single owner of queue state
//! - **dispatcher**: async dispatch loop and attempt runner
//! - **pacing / retry / breaker**: the three policies the dispatcher applies
//! - **channel**: typed listener registry used for `progress` and `done`

mod breaker;
mod channel;
mod dispatcher;
mod pacing;
mod record;
mod retry;
mod state;
mod task_queue;

pub use self::breaker::CircuitBreaker;
pub use self::channel::{EventChannel, Subscription};
pub use self::pacing::PacingGate;
pub use self::retry::RetryPolicy;
pub use self::state::Phase;
pub use self::task_queue::TaskQueue;
