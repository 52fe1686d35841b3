// Identity module - Who is on the other end of the link

mod node;

pub use node::PeerId;
