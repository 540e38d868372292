// Trait to generalize over primitive number types whose slices can be reinterpreted as bytes.
pub trait Align1: bytemuck::Pod {}

impl Align1 for u8 {}
impl Align1 for i8 {}
impl Align1 for u16 {}
impl Align1 for i16 {}
impl Align1 for u32 {}
impl Align1 for i32 {}
impl Align1 for u64 {}
impl Align1 for i64 {}
impl Align1 for f32 {}
impl Align1 for f64 {}

// Trait to generalize over primitive number types that are 8 bytes aligned, a receive
// buffer of these can be viewed as a slice of `f64` cells without copying.
pub trait Align8: Align1 {}

impl Align8 for u64 {}
impl Align8 for i64 {}
impl Align8 for f64 {}
