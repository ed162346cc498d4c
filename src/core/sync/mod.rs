/*!
 * Synchronization Primitives
 *
 * Lock-free building blocks for read-heavy shared state:
 * - RCU (Read-Copy-Update) for configuration tables and profiles
 */

mod rcu;

pub use rcu::RcuCell;
