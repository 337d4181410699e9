//! Python-Rust Bridge using PyO3
//! Registers the Jimeng node and its video adapter with the Python node-graph host

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyType};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::node::{
    self, GenerationResult, HostContext, HostInputs, JimengVideoNode, RawFrame, NODE_CATEGORY,
    NODE_DISPLAY_NAME, NODE_FUNCTION, NODE_ID,
};
use crate::{Config, JimengError, VideoHandle, VideoOutput};

/// Accepts an image batch tensor (`[B, H, W, C]` or `[H, W, C]`, torch or numpy)
/// or an already flattened `(width, height, channels, values)` tuple.
fn extract_frame(frame: &Bound<'_, PyAny>) -> PyResult<RawFrame> {
    if let Ok(raw) = frame.extract::<RawFrame>() {
        return Ok(raw);
    }

    let mut image = frame.clone();
    let shape: Vec<usize> = image.getattr("shape")?.extract()?;
    if shape.len() == 4 {
        image = image.get_item(0)?;
    }
    if image.hasattr("cpu")? {
        image = image.call_method0("cpu")?;
    }

    let shape: Vec<usize> = image.getattr("shape")?.extract()?;
    let (height, width, channels) = match shape.as_slice() {
        [h, w] => (*h, *w, 1),
        [h, w, c] => (*h, *w, *c),
        _ => {
            return Err(PyValueError::new_err(format!(
                "unsupported image shape {:?}",
                shape
            )))
        }
    };
    let data: Vec<f32> = image
        .call_method0("flatten")?
        .call_method0("tolist")?
        .extract()?;

    Ok((width as u32, height as u32, channels as u32, data))
}

fn extract_optional_frame(frame: Option<Bound<'_, PyAny>>) -> crate::Result<Option<RawFrame>> {
    frame
        .filter(|frame| !frame.is_none())
        .map(|frame| {
            extract_frame(&frame).map_err(|e| JimengError::InvalidFrame(e.to_string()))
        })
        .transpose()
}

fn default_media_type() -> String {
    Config::load().unwrap_or_default().output.media_type
}

/// Video adapter handed to downstream save nodes
#[pyclass(name = "JimengVideoAdapter")]
pub struct PyVideoAdapter {
    video: VideoHandle,
    runtime: Arc<Runtime>,
}

#[pymethods]
impl PyVideoAdapter {
    #[getter]
    fn video_path(&self) -> String {
        self.video
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    fn get_dimensions(&self, py: Python<'_>) -> (u32, u32) {
        py.allow_threads(|| self.runtime.block_on(self.video.probe_dimensions()))
    }

    #[pyo3(signature = (output_path, format = "auto", codec = "auto", metadata = None))]
    fn save_to(
        &self,
        py: Python<'_>,
        output_path: PathBuf,
        format: &str,
        codec: &str,
        metadata: Option<Bound<'_, PyAny>>,
    ) -> bool {
        let _ = (format, codec, metadata);
        py.allow_threads(|| match self.runtime.block_on(self.video.copy_to(&output_path)) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("[JimengVideoAdapter] Failed to save video: {}", e);
                false
            }
        })
    }
}

/// The node class registered with the host
#[pyclass(name = "JimengVideo")]
pub struct PyJimengVideo {
    node: JimengVideoNode,
    runtime: Arc<Runtime>,
}

#[pymethods]
impl PyJimengVideo {
    #[classattr]
    const RETURN_NAMES: (&'static str, &'static str, &'static str) =
        (node::RETURN_NAMES[0], node::RETURN_NAMES[1], node::RETURN_NAMES[2]);

    #[classattr]
    const FUNCTION: &'static str = NODE_FUNCTION;

    #[classattr]
    const CATEGORY: &'static str = NODE_CATEGORY;

    #[classattr]
    const OUTPUT_NODE: bool = false;

    #[classattr]
    #[allow(non_snake_case)]
    fn RETURN_TYPES() -> (String, String, String) {
        let [video, url, info] = node::return_types(&default_media_type());
        (video, url, info)
    }

    #[classmethod]
    #[allow(non_snake_case)]
    fn INPUT_TYPES(_cls: &Bound<'_, PyType>, py: Python<'_>) -> PyResult<PyObject> {
        let config = Config::load().unwrap_or_default();
        let declaration = node::input_types(&config.api.base_url).to_string();
        let json = PyModule::import_bound(py, "json")?;
        Ok(json.call_method1("loads", (declaration,))?.unbind())
    }

    #[new]
    #[pyo3(signature = (output_dir = None, media_type = None))]
    fn new(output_dir: Option<String>, media_type: Option<String>) -> PyResult<Self> {
        let config = Config::load().unwrap_or_default();
        let mut host = HostContext::from_config(&config);
        if let Some(dir) = output_dir {
            host.output_dir = PathBuf::from(dir);
        }
        if let Some(media_type) = media_type {
            host.media_type = media_type;
        }

        let runtime = Runtime::new()
            .map_err(|e| PyRuntimeError::new_err(format!("Failed to create runtime: {}", e)))?;
        let node = JimengVideoNode::new(config, host)
            .map_err(|e| PyRuntimeError::new_err(format!("Failed to create node: {}", e)))?;

        Ok(Self {
            node,
            runtime: Arc::new(runtime),
        })
    }

    /// Always returns the three outputs; failures are reported through `info`
    #[allow(clippy::too_many_arguments)]
    #[pyo3(signature = (
        prompt, model, aspect_ratio, resolution, duration,
        first_frame = None, end_frame = None,
        api_url = String::from("http://localhost:5566"), manual_session = String::new()
    ))]
    fn generate(
        &self,
        py: Python<'_>,
        prompt: String,
        model: String,
        aspect_ratio: String,
        resolution: String,
        duration: String,
        first_frame: Option<Bound<'_, PyAny>>,
        end_frame: Option<Bound<'_, PyAny>>,
        api_url: String,
        manual_session: String,
    ) -> (PyVideoAdapter, String, String) {
        let frames = extract_optional_frame(first_frame)
            .and_then(|first| Ok((first, extract_optional_frame(end_frame)?)));

        let result = match frames {
            Ok((first_frame, end_frame)) => {
                let inputs = HostInputs {
                    prompt,
                    model,
                    aspect_ratio,
                    resolution,
                    duration,
                    first_frame,
                    end_frame,
                    api_url,
                    manual_session,
                };
                py.allow_threads(|| self.runtime.block_on(self.node.generate(inputs)))
            }
            Err(e) => {
                tracing::error!("❌ Invalid frame input: {}", e);
                GenerationResult::failure(&e)
            }
        };

        let (video, video_url, info) = result.into_outputs();
        (
            PyVideoAdapter {
                video,
                runtime: Arc::clone(&self.runtime),
            },
            video_url,
            info,
        )
    }
}

#[pymodule]
fn jimeng_video_node(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();
    m.add_class::<PyJimengVideo>()?;
    m.add_class::<PyVideoAdapter>()?;

    let class_mappings = PyDict::new_bound(py);
    class_mappings.set_item(NODE_ID, py.get_type_bound::<PyJimengVideo>())?;
    let display_name_mappings = PyDict::new_bound(py);
    display_name_mappings.set_item(NODE_ID, NODE_DISPLAY_NAME)?;

    m.add("NODE_CLASS_MAPPINGS", class_mappings)?;
    m.add("NODE_DISPLAY_NAME_MAPPINGS", display_name_mappings)?;
    Ok(())
}
