use crate::error::Result;

/// A trait that represents an unary operation on a value.
/// It needs to implement a transformation of the value and its local derivative.
///
/// Both methods may reject inputs outside the function's domain.
pub trait UnaryFn<T> {
    fn name(&self) -> String;
    fn f(&self, data: &T) -> Result<T>;
    fn grad(&self, data: &T) -> Result<T>;
}

/// An [`UnaryFn`] made of plain function pointers, for functions without a domain restriction.
pub struct PtrUnaryFn<T> {
    pub name: String,
    pub f: fn(&T) -> T,
    pub grad: fn(&T) -> T,
}

impl<T> UnaryFn<T> for PtrUnaryFn<T> {
    fn name(&self) -> String {
        self.name.clone()
    }
    fn f(&self, data: &T) -> Result<T> {
        Ok((self.f)(data))
    }
    fn grad(&self, data: &T) -> Result<T> {
        Ok((self.grad)(data))
    }
}
