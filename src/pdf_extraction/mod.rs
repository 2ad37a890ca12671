// PDF-side collaborators: embedded text and page rasterization
pub mod lopdf_helper;
pub mod rasterizer;
pub mod vector_text;

pub use rasterizer::{PdftoppmRasterizer, RasterRequest, Rasterizer};
pub use vector_text::{is_sufficient_vector_text, PdfTextExtractor, VectorTextExtractor, VectorTextGate};
