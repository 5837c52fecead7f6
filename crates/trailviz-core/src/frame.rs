//! Frame-tagged vectors and attitudes, and the conversion between the
//! vehicle's navigation frame (NED) and the visualization frame (ENU).
//!
//! The conversions are an axis permutation plus sign flips, so they are exact
//! for every input, including NaN and infinities, and each one is its own
//! inverse. Quaternions are never re-normalized.

use core::fmt::Debug;
use core::marker::PhantomData;

use nalgebra::{Quaternion, Vector3};

type Scalar = f64;

// ---------------------------------------------------------------------------
// Frame markers
// ---------------------------------------------------------------------------

/// A reference frame. Every frame has exactly one opposite frame reached by
/// the conversions in this module.
pub trait Frame: Debug + Clone + Copy + PartialEq + Default + 'static {
    type Opposite: Frame<Opposite = Self>;
    const LABEL: &'static str;
}

/// Vehicle navigation frame: north (forward), east (right), down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ned;

/// Visualization world frame: east, north, up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Enu;

impl Frame for Ned {
    type Opposite = Enu;
    const LABEL: &'static str = "ned";
}

impl Frame for Enu {
    type Opposite = Ned;
    const LABEL: &'static str = "enu";
}

// ---------------------------------------------------------------------------
// Tagged values
// ---------------------------------------------------------------------------

/// A 3-vector expressed in frame `F`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameVector<F: Frame> {
    inner: Vector3<Scalar>,
    _frame: PhantomData<F>,
}

pub type NedVector = FrameVector<Ned>;
pub type EnuVector = FrameVector<Enu>;

impl<F: Frame> FrameVector<F> {
    pub fn new(x: Scalar, y: Scalar, z: Scalar) -> Self {
        Self::from_vector(Vector3::new(x, y, z))
    }

    pub fn zeros() -> Self {
        Self::from_vector(Vector3::zeros())
    }

    pub fn from_vector(inner: Vector3<Scalar>) -> Self {
        Self {
            inner,
            _frame: PhantomData,
        }
    }

    pub fn x(&self) -> Scalar {
        self.inner.x
    }

    pub fn y(&self) -> Scalar {
        self.inner.y
    }

    pub fn z(&self) -> Scalar {
        self.inner.z
    }

    pub fn as_vector(&self) -> &Vector3<Scalar> {
        &self.inner
    }

    pub fn to_array(&self) -> [Scalar; 3] {
        [self.inner.x, self.inner.y, self.inner.z]
    }
}

impl<F: Frame> Default for FrameVector<F> {
    fn default() -> Self {
        Self::zeros()
    }
}

/// An attitude quaternion expressed in frame `F`. Components are stored as
/// given; no unit-norm check is made.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attitude<F: Frame> {
    inner: Quaternion<Scalar>,
    _frame: PhantomData<F>,
}

pub type NedAttitude = Attitude<Ned>;
pub type EnuAttitude = Attitude<Enu>;

impl<F: Frame> Attitude<F> {
    pub fn new(w: Scalar, x: Scalar, y: Scalar, z: Scalar) -> Self {
        Self::from_quaternion(Quaternion::new(w, x, y, z))
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    pub fn from_quaternion(inner: Quaternion<Scalar>) -> Self {
        Self {
            inner,
            _frame: PhantomData,
        }
    }

    pub fn w(&self) -> Scalar {
        self.inner.w
    }

    pub fn x(&self) -> Scalar {
        self.inner.i
    }

    pub fn y(&self) -> Scalar {
        self.inner.j
    }

    pub fn z(&self) -> Scalar {
        self.inner.k
    }

    pub fn as_quaternion(&self) -> &Quaternion<Scalar> {
        &self.inner
    }

    /// Components in `[w, x, y, z]` order.
    pub fn to_array(&self) -> [Scalar; 4] {
        [self.w(), self.x(), self.y(), self.z()]
    }
}

impl<F: Frame> Default for Attitude<F> {
    fn default() -> Self {
        Self::identity()
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// (w, x, y, z) -> (w, -x, -y, z).
pub fn convert_attitude<F: Frame>(q: Attitude<F>) -> Attitude<F::Opposite> {
    Attitude::new(q.w(), -q.x(), -q.y(), q.z())
}

/// (x, y, z) -> (y, x, -z).
pub fn convert_position<F: Frame>(p: FrameVector<F>) -> FrameVector<F::Opposite> {
    FrameVector::new(p.y(), p.x(), -p.z())
}

/// Same permutation as [`convert_position`].
pub fn convert_velocity<F: Frame>(v: FrameVector<F>) -> FrameVector<F::Opposite> {
    convert_position(v)
}
