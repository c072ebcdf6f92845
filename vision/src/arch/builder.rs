use rand::{Rng, RngCore};

use super::{
    Sequential,
    layers::{ActFn, BatchNorm2d, Conv2d, Dense, Dropout, Flatten, Layer, MaxPool2d},
};

const CONV_FILTERS: [usize; 4] = [32, 64, 128, 256];

/// The stock cat/dog classifier: four convolution blocks (3x3 valid
/// convolution with ReLU, batch normalization, 2x2 max-pooling) with filter
/// counts 32 -> 64 -> 128 -> 256, then dense 512 (ReLU), dropout 0.5, dense
/// 256 (ReLU), dropout 0.3 and a single sigmoid output.
///
/// # Arguments
/// * `input` - Image extent as `(height, width)`; channels are fixed at RGB.
/// * `rng` - Source for Glorot-uniform weight initialization and the dropout
///   masks.
pub fn cat_dog<R: Rng>(input: (usize, usize), rng: &mut R) -> Sequential {
    let (mut h, mut w) = input;
    let mut in_ch = 3;
    let mut layers = Vec::new();

    for filters in CONV_FILTERS {
        layers.push(Layer::Conv2d(Conv2d::new(
            3,
            in_ch,
            filters,
            Some(ActFn::Relu),
            rng,
        )));
        layers.push(Layer::BatchNorm2d(BatchNorm2d::new(filters)));
        layers.push(Layer::MaxPool2d(MaxPool2d::new(2)));
        h = (h - 2) / 2;
        w = (w - 2) / 2;
        in_ch = filters;
    }

    let flat = h * w * in_ch;
    layers.push(Layer::Flatten(Flatten::new()));
    layers.push(Layer::Dense(Dense::new((flat, 512), Some(ActFn::Relu), rng)));
    layers.push(Layer::Dropout(Dropout::new(0.5, rng.next_u64())));
    layers.push(Layer::Dense(Dense::new((512, 256), Some(ActFn::Relu), rng)));
    layers.push(Layer::Dropout(Dropout::new(0.3, rng.next_u64())));
    layers.push(Layer::Dense(Dense::new(
        (256, 1),
        Some(ActFn::Sigmoid),
        rng,
    )));

    Sequential::new(layers)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn stock_architecture_layout() {
        let mut rng = StdRng::seed_from_u64(1);
        let model = cat_dog((128, 128), &mut rng);

        // 4 conv blocks of 3 layers, then flatten + 3 dense + 2 dropout.
        let summary = model.summary();
        assert_eq!(summary.lines().count(), 18 + 1);
        assert!(summary.contains("conv2d 3x3, 3 -> 32"));
        assert!(summary.contains("conv2d 3x3, 128 -> 256"));
        assert!(summary.contains("dense 9216 -> 512"));
        assert!(summary.contains("dense 256 -> 1, sigmoid"));
    }

    #[test]
    fn trainable_tensor_layout() {
        let mut rng = StdRng::seed_from_u64(1);
        let model = cat_dog((128, 128), &mut rng);

        // (w, b) for 4 convs, (gamma, beta) for 4 norms, (w, b) for 3 denses.
        assert_eq!(model.param_sizes().len(), 22);
        assert_eq!(model.param_sizes()[0], 3 * 3 * 3 * 32);
    }
}
