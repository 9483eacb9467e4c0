pub mod communicator;
pub mod entangler;
pub mod load;
pub mod permuted;

pub use communicator::{Communicator, LocalComm};
pub use entangler::{Entangler, Wire};
pub use load::LoadBalance;
pub use permuted::PermutedDistributedArray;
