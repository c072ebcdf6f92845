use std::{collections::HashMap, fs, path::Path};

use rand::{SeedableRng, rngs::StdRng};
use safetensors::{Dtype, SafeTensors, serialize, tensor::TensorView};

use crate::{
    Result, VisionErr,
    arch::{Sequential, StateMap, builder},
    inference::TARGET_SIZE,
};

/// Persists the full model state (weights and batch norm running
/// statistics) as one safetensors file, creating parent directories as
/// needed.
pub fn save(model: &Sequential, path: &Path) -> Result<()> {
    let state = model.state();

    let mut views = Vec::with_capacity(state.len());
    for (name, shape, data) in &state {
        let view = TensorView::new(Dtype::F32, shape.clone(), bytemuck::cast_slice(data))?;
        views.push((name.clone(), view));
    }

    let blob = serialize(views, &None)?;
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    fs::write(path, blob)?;
    Ok(())
}

/// Loads a checkpoint produced by [`save`] into `model`, validating every
/// tensor's shape against the architecture.
pub fn load_into(model: &mut Sequential, path: &Path) -> Result<()> {
    let bytes = fs::read(path)?;
    let st = SafeTensors::deserialize(&bytes)?;

    let mut map: StateMap = HashMap::new();
    for (name, view) in st.tensors() {
        if view.dtype() != Dtype::F32 {
            return Err(VisionErr::TensorDtype { name });
        }
        let data = view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        map.insert(name, (view.shape().to_vec(), data));
    }

    model.load_state(&map)
}

/// Rebuilds the stock cat/dog architecture and loads the artifact into it.
/// This is the serving-side entry point: one read at startup.
pub fn load_cat_dog(path: &Path) -> Result<Sequential> {
    let mut rng = StdRng::seed_from_u64(0);
    let (h, w) = TARGET_SIZE;
    let mut model = builder::cat_dog((h as usize, w as usize), &mut rng);
    load_into(&mut model, path)?;
    Ok(model)
}
