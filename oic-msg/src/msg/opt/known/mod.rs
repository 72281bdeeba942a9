use super::OptNumber;

/// Content-Format values
pub mod content_format;
pub use content_format::*;

/// Block1 / Block2 values
pub mod block;
pub use block::*;

/// Observe values
pub mod observe;

macro_rules! opt {
  (#[doc = $doc:expr] $name:ident = $n:literal) => {
    #[doc = $doc]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: OptNumber = OptNumber($n);
  };
}

opt!(#[doc = "Register (0) or deregister (1) interest in a resource (RFC7641)"]
     OBSERVE = 6);
opt!(#[doc = "One segment of the absolute path to the resource"]
     URI_PATH = 11);
opt!(#[doc = "Representation format of the message payload"]
     CONTENT_FORMAT = 12);
opt!(#[doc = "Maximum time a response may be cached before it is considered not fresh"]
     MAX_AGE = 14);
opt!(#[doc = "One argument parameterizing the resource"]
     URI_QUERY = 15);
opt!(#[doc = "Which Content-Format is acceptable to the client"]
     ACCEPT = 17);
opt!(#[doc = "Block-wise transfer of the response payload (RFC7959)"]
     BLOCK2 = 23);
opt!(#[doc = "Block-wise transfer of the request payload (RFC7959)"]
     BLOCK1 = 27);
opt!(#[doc = "Total size of the response payload (RFC7959)"]
     SIZE2 = 28);
opt!(#[doc = "Total size of the request payload"]
     SIZE1 = 60);

/// Every option this crate understands, in the order
/// they are written to the wire.
pub const ORDER: [OptNumber; 10] = [OBSERVE,
                                    URI_PATH,
                                    CONTENT_FORMAT,
                                    MAX_AGE,
                                    URI_QUERY,
                                    ACCEPT,
                                    BLOCK2,
                                    BLOCK1,
                                    SIZE2,
                                    SIZE1];
