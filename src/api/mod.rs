mod impls;
mod predictions;
mod requests;
mod responses;
mod util;

pub use self::predictions::*;
pub use impls::*;
pub use requests::*;
pub use responses::*;
pub use util::*;
