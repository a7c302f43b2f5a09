mod contact;
mod material;
mod order;
mod processed_payment;
mod subscriber;

pub use contact::*;
pub use material::*;
pub use order::*;
pub use processed_payment::*;
pub use subscriber::*;
