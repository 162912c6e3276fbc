mod minmax;
pub use self::minmax::*;
