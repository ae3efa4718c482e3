// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tuple-based argument (de)serialization glue shared by `RemoteProcedure`
//! (encode) and `registry::typed` (decode). Rust has no variadic
//! templates, so where the original's `RemoteProcedure<R, A...>` leans on
//! template-pack expansion, a fixed set of tuple arities is expanded via
//! `macro_rules!` instead — the usual Rust stand-in for that pattern (the
//! same trick `serde`'s and `warp`'s tuple impls use).

use crate::error::Error;
use crate::value::SerializationInfo;

/// Encodes `Self` into an ordered call-argument list.
pub trait IntoArgs {
    fn into_args(self) -> Vec<SerializationInfo>;
}

/// Decodes an ordered argument array back into `Self`.
pub trait FromArgs: Sized {
    fn from_args(args: &SerializationInfo) -> Result<Self, Error>;
}

macro_rules! impl_args_tuple {
    ($($T:ident : $idx:tt),*) => {
        #[allow(unused_variables, non_snake_case)]
        impl<$($T: Into<SerializationInfo>),*> IntoArgs for ($($T,)*) {
            fn into_args(self) -> Vec<SerializationInfo> {
                let ($($T,)*) = self;
                vec![$($T.into()),*]
            }
        }

        #[allow(unused_variables)]
        impl<$($T),*> FromArgs for ($($T,)*)
        where
            $($T: for<'a> TryFrom<&'a SerializationInfo, Error = Error>),*
        {
            fn from_args(args: &SerializationInfo) -> Result<Self, Error> {
                Ok(($($T::try_from(args.get_element($idx))?,)*))
            }
        }
    };
}

impl_args_tuple!();
impl_args_tuple!(A: 0);
impl_args_tuple!(A: 0, B: 1);
impl_args_tuple!(A: 0, B: 1, C: 2);
impl_args_tuple!(A: 0, B: 1, C: 2, D: 3);

/// Pack an ordered argument list into the `SerializationInfo` array every
/// `WireCodec::encode_call` expects, the call-site counterpart to
/// `FromArgs::from_args` on the dispatch side.
pub(crate) fn args_to_array(values: Vec<SerializationInfo>) -> SerializationInfo {
    let mut array = SerializationInfo::new_array();
    for value in values {
        *array.add_element() = value;
    }
    array
}
