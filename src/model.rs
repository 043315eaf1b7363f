use std::fs::File;
use std::io::Read;
use std::path::Path;

use tensorflow::{
    Graph, ImportGraphDefOptions, Operation, Session, SessionOptions, SessionRunArgs, Tensor,
};

use crate::error::{ModelError, PredictError};
use crate::preprocess::BatchTensor;

/// A loaded binary classifier. Implementations are shared read-only across
/// requests, so `forward` must be safe to call concurrently.
pub trait Classifier: Send + Sync {
    /// Runs one forward pass and returns the output tensor flattened row-major.
    fn forward(&self, input: &BatchTensor) -> Result<Vec<f32>, PredictError>;
}

/// Frozen TensorFlow graph with a `(1, 64, 64, 3)` input and a single
/// sigmoid output.
pub struct TensorflowClassifier {
    session: Session,
    input: Operation,
    output: Operation,
}

impl TensorflowClassifier {
    pub fn load(model_path: &Path, input_op: &str, output_op: &str) -> Result<Self, ModelError> {
        let path = model_path.display().to_string();
        let mut model_bytes = Vec::new();
        File::open(model_path)
            .and_then(|mut file| file.read_to_end(&mut model_bytes))
            .map_err(|source| ModelError::Io {
                path: path.clone(),
                source,
            })?;

        let mut graph = Graph::new();
        graph
            .import_graph_def(&model_bytes, &ImportGraphDefOptions::new())
            .map_err(|status| ModelError::Import {
                path,
                detail: status.to_string(),
            })?;

        let session = Session::new(&SessionOptions::new(), &graph)
            .map_err(|status| ModelError::Session(status.to_string()))?;

        let input = find_operation(&graph, input_op)?;
        let output = find_operation(&graph, output_op)?;

        tracing::info!(
            model = %model_path.display(),
            input = input_op,
            output = output_op,
            "model loaded"
        );

        Ok(TensorflowClassifier {
            session,
            input,
            output,
        })
    }
}

fn find_operation(graph: &Graph, name: &str) -> Result<Operation, ModelError> {
    match graph.operation_by_name(name) {
        Ok(Some(operation)) => Ok(operation),
        _ => Err(ModelError::MissingOperation(name.to_string())),
    }
}

impl Classifier for TensorflowClassifier {
    fn forward(&self, input: &BatchTensor) -> Result<Vec<f32>, PredictError> {
        let mut input_tensor = Tensor::<f32>::new(&input.shape());
        input_tensor.copy_from_slice(&input.to_flat());

        let mut args = SessionRunArgs::new();
        args.add_feed(&self.input, 0, &input_tensor);
        let output_token = args.request_fetch(&self.output, 0);

        self.session
            .run(&mut args)
            .map_err(|status| PredictError::Inference(status.to_string()))?;

        let output_tensor: Tensor<f32> = args
            .fetch(output_token)
            .map_err(|status| PredictError::Inference(status.to_string()))?;

        Ok(output_tensor.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tensorflow::{DataType, Output, Shape};

    use super::*;
    use crate::preprocess::{normalize, CHANNELS, IMAGE_SIZE};

    /// Writes a frozen graph computing `sigmoid(mean(x))` over a
    /// `(1, 64, 64, 3)` placeholder `x`, with the output named `Identity`.
    fn write_mean_sigmoid_graph(tag: &str) -> PathBuf {
        let mut graph = Graph::new();

        let mut x = graph.new_operation("Placeholder", "x").unwrap();
        x.set_attr_type("dtype", DataType::Float).unwrap();
        x.set_attr_shape(
            "shape",
            &Shape::from(Some(vec![
                Some(1),
                Some(IMAGE_SIZE as i64),
                Some(IMAGE_SIZE as i64),
                Some(CHANNELS as i64),
            ])),
        )
        .unwrap();
        let x = x.finish().unwrap();

        let mut axes = graph.new_operation("Const", "axes").unwrap();
        axes.set_attr_type("dtype", DataType::Int32).unwrap();
        axes.set_attr_tensor("value", Tensor::<i32>::new(&[3]).with_values(&[1, 2, 3]).unwrap())
            .unwrap();
        let axes = axes.finish().unwrap();

        let mut mean = graph.new_operation("Mean", "mean").unwrap();
        mean.add_input(Output { operation: x, index: 0 });
        mean.add_input(Output { operation: axes, index: 0 });
        mean.set_attr_bool("keep_dims", true).unwrap();
        let mean = mean.finish().unwrap();

        let mut sigmoid = graph.new_operation("Sigmoid", "Identity").unwrap();
        sigmoid.add_input(Output { operation: mean, index: 0 });
        sigmoid.finish().unwrap();

        let path = std::env::temp_dir().join(format!(
            "mean-sigmoid-{}-{}.pb",
            tag,
            std::process::id()
        ));
        std::fs::write(&path, graph.graph_def().unwrap()).unwrap();
        path
    }

    fn uniform_batch(value: u8) -> BatchTensor {
        let image = image::RgbImage::from_pixel(
            IMAGE_SIZE as u32,
            IMAGE_SIZE as u32,
            image::Rgb([value; CHANNELS]),
        );
        normalize(&image).into_batch()
    }

    #[test]
    fn forward_runs_frozen_graph() {
        let path = write_mean_sigmoid_graph("forward");
        let classifier = TensorflowClassifier::load(&path, "x", "Identity");
        std::fs::remove_file(&path).unwrap();
        let classifier = classifier.unwrap();

        let dark = classifier.forward(&uniform_batch(0)).unwrap();
        assert_eq!(dark.len(), 1);
        assert!((dark[0] - 0.5).abs() < 1e-6);

        let bright = classifier.forward(&uniform_batch(255)).unwrap();
        assert_eq!(bright.len(), 1);
        let expected = 1.0 / (1.0 + (-1.0f32).exp());
        assert!((bright[0] - expected).abs() < 1e-5);
        assert!((0.0..=1.0).contains(&bright[0]));

        assert_eq!(classifier.forward(&uniform_batch(255)).unwrap(), bright);
    }

    #[test]
    fn unknown_operation_fails_to_load() {
        let path = write_mean_sigmoid_graph("missing-op");
        let result = TensorflowClassifier::load(&path, "x", "nope");
        std::fs::remove_file(&path).unwrap();
        match result {
            Err(ModelError::MissingOperation(name)) => assert_eq!(name, "nope"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("graph without 'nope' loaded"),
        }
    }

    #[test]
    fn missing_artifact_fails_to_load() {
        let err = TensorflowClassifier::load(Path::new("./does/not/exist.pb"), "x", "Identity")
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::Io { .. }));
    }

    #[test]
    fn corrupt_artifact_fails_to_load() {
        let path = std::env::temp_dir().join(format!("corrupt-model-{}.pb", std::process::id()));
        std::fs::write(&path, b"this is not a graph").unwrap();
        let result = TensorflowClassifier::load(&path, "x", "Identity");
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ModelError::Import { .. })));
    }
}
