use nalgebra::DVector;

use crate::traits::Scalar;

/// Numeric payload of a simulation state.
///
/// A state's value may be a single scalar, a vector over a population of
/// compartments, or an arbitrarily nested tree of either. Blending during
/// integration applies element-wise over matching structure.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<T: Scalar> {
    Scalar(T),
    Vector(DVector<T>),
    Tree(Vec<Value<T>>),
}

impl<T: Scalar> Value<T> {
    /// `true` if `other` has the same structure: variant, vector lengths and
    /// tree arities, recursively.
    pub fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Scalar(_), Value::Scalar(_)) => true,
            (Value::Vector(a), Value::Vector(b)) => a.len() == b.len(),
            (Value::Tree(a), Value::Tree(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
            }
            _ => false,
        }
    }

    /// Computes `self + dt * sum(coeffs[i] * ks[i])` element-wise.
    ///
    /// Returns `None` when any derivative's structure disagrees with the
    /// structure of `self`. Coefficient/derivative cardinality is the
    /// caller's responsibility.
    pub(crate) fn blend(&self, dt: T, coeffs: &[f64], ks: &[&Value<T>]) -> Option<Value<T>> {
        match self {
            Value::Scalar(y0) => {
                let mut acc = T::zero();
                for (c, k) in coeffs.iter().zip(ks) {
                    let Value::Scalar(kv) = *k else { return None };
                    acc = acc + T::from_f64(*c)? * *kv;
                }
                Some(Value::Scalar(*y0 + acc * dt))
            }
            Value::Vector(y0) => {
                let mut acc = DVector::from_element(y0.len(), T::zero());
                for (c, k) in coeffs.iter().zip(ks) {
                    let Value::Vector(kv) = *k else { return None };
                    if kv.len() != y0.len() {
                        return None;
                    }
                    let c = T::from_f64(*c)?;
                    for (a, k) in acc.iter_mut().zip(kv.iter()) {
                        *a = *a + c * *k;
                    }
                }
                Some(Value::Vector(DVector::from_iterator(
                    y0.len(),
                    y0.iter().zip(acc.iter()).map(|(y, a)| *y + *a * dt),
                )))
            }
            Value::Tree(children) => {
                let mut out = Vec::with_capacity(children.len());
                for (idx, child) in children.iter().enumerate() {
                    let mut column = Vec::with_capacity(ks.len());
                    for k in ks {
                        let Value::Tree(kc) = *k else { return None };
                        if kc.len() != children.len() {
                            return None;
                        }
                        column.push(&kc[idx]);
                    }
                    out.push(child.blend(dt, coeffs, &column)?);
                }
                Some(Value::Tree(out))
            }
        }
    }
}

/// A differential-equation state: a named value integrated by the engine,
/// with a transient derivative slot written once per Runge-Kutta stage.
///
/// The `diffusion` slot is reserved for stochastic (SDE) extensions and is
/// not consumed by the deterministic stepper.
#[derive(Debug, Clone)]
pub struct DiffEqState<T: Scalar> {
    name: String,
    value: Value<T>,
    derivative: Option<Value<T>>,
    diffusion: Option<Value<T>>,
}

impl<T: Scalar> DiffEqState<T> {
    pub fn new(name: impl Into<String>, value: Value<T>) -> Self {
        Self {
            name: name.into(),
            value,
            derivative: None,
            diffusion: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value<T> {
        &self.value
    }

    /// Overwrites the carried value. Intended for model-side initialization
    /// and resets; during a step the engine itself writes the value.
    pub fn set_value(&mut self, value: Value<T>) {
        self.value = value;
    }

    pub fn derivative(&self) -> Option<&Value<T>> {
        self.derivative.as_ref()
    }

    /// Records this stage's derivative. Calling this is what marks the state
    /// as "written" for the current stage.
    pub fn set_derivative(&mut self, derivative: Value<T>) {
        self.derivative = Some(derivative);
    }

    pub fn diffusion(&self) -> Option<&Value<T>> {
        self.diffusion.as_ref()
    }

    /// Records a diffusion (noise) term. Reserved; the deterministic stepper
    /// ignores it.
    pub fn set_diffusion(&mut self, diffusion: Value<T>) {
        self.diffusion = Some(diffusion);
    }

    /// Convenience accessor for vector-valued states.
    pub fn vector(&self) -> Option<&DVector<T>> {
        match &self.value {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn take_derivative(&mut self) -> Option<Value<T>> {
        self.derivative.take()
    }

    pub(crate) fn clear_derivative(&mut self) {
        self.derivative = None;
    }
}

/// A named non-differential state (e.g. a spike flag or cached quantity).
///
/// Writes are recorded so the engine can reject derivative evaluations that
/// mutate anything other than differential states.
#[derive(Debug, Clone)]
pub struct AuxState<T: Scalar> {
    name: String,
    value: Value<T>,
    written: bool,
}

impl<T: Scalar> AuxState<T> {
    pub fn new(name: impl Into<String>, value: Value<T>) -> Self {
        Self {
            name: name.into(),
            value,
            written: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value<T> {
        &self.value
    }

    pub fn set_value(&mut self, value: Value<T>) {
        self.written = true;
        self.value = value;
    }

    pub fn written(&self) -> bool {
        self.written
    }

    pub(crate) fn clear_written(&mut self) {
        self.written = false;
    }
}

/// Mutable reference to one enumerated state, differential or auxiliary.
pub enum StateRef<'a, T: Scalar> {
    DiffEq(&'a mut DiffEqState<T>),
    Aux(&'a mut AuxState<T>),
}
