mod descriptor;
pub use descriptor::{Descriptor, DESCRIPTOR_BINS, DESCRIPTOR_CELLS, DESCRIPTOR_SIZE};

mod extractor;
pub use extractor::{ExtractorConfig, FeatureExtractor, Features, Keypoint};

mod responses;
pub use responses::harris_response;
