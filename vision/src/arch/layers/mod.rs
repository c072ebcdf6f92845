mod activations;
mod conv;
mod dense;
mod dropout;
mod flatten;
mod norm;
mod pool;

use std::slice::IterMut;

pub use activations::ActFn;
pub use conv::Conv2d;
pub use dense::Dense;
pub use dropout::Dropout;
pub use flatten::Flatten;
pub use norm::BatchNorm2d;
pub use pool::MaxPool2d;

use crate::{
    Result, VisionErr,
    arch::{Phase, Tensor, sequential::StateMap},
    optimization::Adam,
};

/// One stage of a [`super::Sequential`] network.
#[derive(Debug, Clone)]
pub enum Layer {
    Conv2d(Conv2d),
    BatchNorm2d(BatchNorm2d),
    MaxPool2d(MaxPool2d),
    Flatten(Flatten),
    Dense(Dense),
    Dropout(Dropout),
}

impl Layer {
    pub fn forward(&mut self, x: Tensor, phase: Phase) -> Result<Tensor> {
        match self {
            Layer::Conv2d(l) => Ok(l.forward(x.into_d4("conv2d")?, phase)?.into()),
            Layer::BatchNorm2d(l) => Ok(l.forward(x.into_d4("batch_norm")?, phase)?.into()),
            Layer::MaxPool2d(l) => Ok(l.forward(x.into_d4("max_pool")?, phase)?.into()),
            Layer::Flatten(l) => Ok(l.forward(x.into_d4("flatten")?, phase)?.into()),
            Layer::Dense(l) => Ok(l.forward(x.into_d2("dense")?, phase)?.into()),
            Layer::Dropout(l) => Ok(l.forward(x.into_d2("dropout")?, phase)?.into()),
        }
    }

    pub fn backward(&mut self, d: Tensor) -> Result<Tensor> {
        match self {
            Layer::Conv2d(l) => Ok(l.backward(d.into_d4("conv2d delta")?)?.into()),
            Layer::BatchNorm2d(l) => Ok(l.backward(d.into_d4("batch_norm delta")?)?.into()),
            Layer::MaxPool2d(l) => Ok(l.backward(d.into_d4("max_pool delta")?)?.into()),
            Layer::Flatten(l) => Ok(l.backward(d.into_d2("flatten delta")?)?.into()),
            Layer::Dense(l) => Ok(l.backward(d.into_d2("dense delta")?)?.into()),
            Layer::Dropout(l) => Ok(l.backward(d.into_d2("dropout delta")?)?.into()),
        }
    }

    /// Lengths of this layer's trainable tensors, in update order.
    pub fn param_sizes(&self) -> Vec<usize> {
        match self {
            Layer::Conv2d(l) => l.param_sizes(),
            Layer::BatchNorm2d(l) => l.param_sizes(),
            Layer::Dense(l) => l.param_sizes(),
            Layer::MaxPool2d(_) | Layer::Flatten(_) | Layer::Dropout(_) => Vec::new(),
        }
    }

    /// Applies one optimizer instance per trainable tensor, drawn from `opts`
    /// in the same order [`Layer::param_sizes`] reports.
    pub fn update(&mut self, opts: &mut IterMut<'_, Adam>) -> Result<()> {
        match self {
            Layer::Conv2d(l) => {
                next(opts)?.update_params(l.dw.as_slice().unwrap(), l.w.as_slice_mut().unwrap())?;
                next(opts)?.update_params(l.db.as_slice().unwrap(), l.b.as_slice_mut().unwrap())
            }
            Layer::BatchNorm2d(l) => {
                next(opts)?.update_params(
                    l.dgamma.as_slice().unwrap(),
                    l.gamma.as_slice_mut().unwrap(),
                )?;
                next(opts)?
                    .update_params(l.dbeta.as_slice().unwrap(), l.beta.as_slice_mut().unwrap())
            }
            Layer::Dense(l) => {
                next(opts)?.update_params(l.dw.as_slice().unwrap(), l.w.as_slice_mut().unwrap())?;
                next(opts)?.update_params(l.db.as_slice().unwrap(), l.b.as_slice_mut().unwrap())
            }
            Layer::MaxPool2d(_) | Layer::Flatten(_) | Layer::Dropout(_) => Ok(()),
        }
    }

    pub fn param_count(&self) -> usize {
        match self {
            Layer::Conv2d(l) => l.param_count(),
            Layer::BatchNorm2d(l) => l.param_count(),
            Layer::Dense(l) => l.param_count(),
            Layer::MaxPool2d(_) | Layer::Flatten(_) | Layer::Dropout(_) => 0,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Layer::Conv2d(l) => l.describe(),
            Layer::BatchNorm2d(l) => l.describe(),
            Layer::MaxPool2d(l) => l.describe(),
            Layer::Flatten(l) => l.describe(),
            Layer::Dense(l) => l.describe(),
            Layer::Dropout(l) => l.describe(),
        }
    }

    pub fn state(&self, prefix: &str, out: &mut Vec<(String, Vec<usize>, Vec<f32>)>) {
        match self {
            Layer::Conv2d(l) => l.state(prefix, out),
            Layer::BatchNorm2d(l) => l.state(prefix, out),
            Layer::Dense(l) => l.state(prefix, out),
            Layer::MaxPool2d(_) | Layer::Flatten(_) | Layer::Dropout(_) => {}
        }
    }

    pub fn load_state(&mut self, prefix: &str, map: &StateMap) -> Result<()> {
        match self {
            Layer::Conv2d(l) => l.load_state(prefix, map),
            Layer::BatchNorm2d(l) => l.load_state(prefix, map),
            Layer::Dense(l) => l.load_state(prefix, map),
            Layer::MaxPool2d(_) | Layer::Flatten(_) | Layer::Dropout(_) => Ok(()),
        }
    }
}

fn next<'a, 'b>(opts: &'b mut IterMut<'a, Adam>) -> Result<&'a mut Adam> {
    opts.next().ok_or(VisionErr::MissingOptimizer)
}

/// Copies one named checkpoint tensor into `dst` after validating its shape.
fn copy_tensor(map: &StateMap, name: &str, shape: &[usize], dst: &mut [f32]) -> Result<()> {
    let (got_shape, data) = map.get(name).ok_or_else(|| VisionErr::MissingTensor {
        name: name.to_string(),
    })?;

    if got_shape.as_slice() != shape || data.len() != dst.len() {
        return Err(VisionErr::ShapeMismatch {
            what: "checkpoint tensor",
            got: data.len(),
            expected: dst.len(),
        });
    }

    dst.copy_from_slice(data);
    Ok(())
}
