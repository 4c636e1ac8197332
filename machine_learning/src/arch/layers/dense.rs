use ndarray::{Array1, Array2, ArrayView2, ArrayViewD, ArrayViewMutD, Axis, Ix1, Ix2, linalg};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer, `a = act_fn(x · w + b)`.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,

    w: Array2<f32>,
    b: Array1<f32>,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,

    // Backward metadata
    dw: Array2<f32>,
    db: Array1<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer with every parameter set to zero.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    /// * `act_fn` - An optional activation function.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            act_fn,
            w: Array2::zeros(dim),
            b: Array1::zeros(dim.1),
            x: Array2::zeros((0, dim.0)),
            z: Array2::zeros((0, dim.1)),
            dw: Array2::zeros(dim),
            db: Array1::zeros(dim.1),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        (self.dim.0 + 1) * self.dim.1
    }

    pub fn weights(&self) -> (&Array2<f32>, &Array1<f32>) {
        (&self.w, &self.b)
    }

    /// Overwrites the parameters of the layer, the shapes must match exactly.
    pub fn set_weights(&mut self, w: ArrayViewD<f32>, b: ArrayViewD<f32>) -> Result<()> {
        if w.shape() != &[self.dim.0, self.dim.1] {
            return Err(MlErr::SizeMismatch {
                what: "dense weights",
                got: w.len(),
                expected: self.dim.0 * self.dim.1,
            });
        }

        if b.shape() != &[self.dim.1] {
            return Err(MlErr::SizeMismatch {
                what: "dense biases",
                got: b.len(),
                expected: self.dim.1,
            });
        }

        let w = w.into_dimensionality::<Ix2>().map_err(|_| MlErr::SizeMismatch {
            what: "dense weight rank",
            got: 0,
            expected: 2,
        })?;
        let b = b.into_dimensionality::<Ix1>().map_err(|_| MlErr::SizeMismatch {
            what: "dense bias rank",
            got: 0,
            expected: 1,
        })?;

        self.w.assign(&w);
        self.b.assign(&b);
        Ok(())
    }

    /// Computes the output of the layer and keeps what `backward` needs.
    pub fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &self.w, 0.0, &mut z);
        z += &self.b;

        self.x = x.to_owned();
        self.z = z;

        let out = match &self.act_fn {
            Some(act_fn) => self.z.mapv(|z| act_fn.f(z)),
            None => self.z.clone(),
        };

        Ok(out)
    }

    /// Back propagates `d`, the derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(&mut self, mut d: Array2<f32>) -> Result<Array2<f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense delta",
                got: d.len(),
                expected: self.z.len(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut self.dw);
        self.db.assign(&d.sum_axis(Axis(0)));

        Ok(d.dot(&self.w.t()))
    }

    /// Returns the `(params, grad)` pairs of this layer, weights first.
    pub fn params_and_grads(&mut self) -> [(ArrayViewMutD<'_, f32>, ArrayViewD<'_, f32>); 2] {
        [
            (self.w.view_mut().into_dyn(), self.dw.view().into_dyn()),
            (self.b.view_mut().into_dyn(), self.db.view().into_dyn()),
        ]
    }
}
