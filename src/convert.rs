//! One-shot conversion entry points.
//!
//! These build a throwaway [`ConverterFactory`], so tools are probed on
//! every call. Long-lived callers should keep a factory and reuse it.

use crate::config::EngineConfig;
use crate::converter::ConversionRequest;
use crate::error::ConvertError;
use crate::factory::ConverterFactory;
use crate::output::ConversionOutput;

/// Convert one file with whichever converter can handle the pair.
///
/// # Example
///
/// ```rust,no_run
/// use docshift::{convert, ConversionRequest, EngineConfig, Format};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let request = ConversionRequest::new("report.md", Format::Docx);
///     let output = convert(&request, &EngineConfig::default()).await?;
///     println!("wrote {}", output.path().display());
///     Ok(())
/// }
/// ```
pub async fn convert(
    request: &ConversionRequest,
    config: &EngineConfig,
) -> Result<ConversionOutput, ConvertError> {
    let factory = ConverterFactory::new(config.clone());
    factory.converter_for(request).convert(request).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    request: &ConversionRequest,
    config: &EngineConfig,
) -> Result<ConversionOutput, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(request, config))
}
