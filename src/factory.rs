//! Picks the converter for a format and owns the shared [`Toolbox`].
//!
//! Converters are built lazily, one per domain, and handed out as
//! `Arc<Converter>`; later calls return the same instance.

use crate::config::EngineConfig;
use crate::converter::{ConversionRequest, Converter};
use crate::error::ConvertError;
use crate::format::{Domain, Format};
use crate::tools::{ToolAvailability, Toolbox};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::debug;

/// Something that names a format: a [`Format`] or a token such as `"jpeg"`.
pub trait FormatKey {
    fn to_format(&self) -> Option<Format>;
}

impl FormatKey for Format {
    fn to_format(&self) -> Option<Format> {
        Some(*self)
    }
}

impl FormatKey for &str {
    fn to_format(&self) -> Option<Format> {
        Format::parse(self)
    }
}

impl FormatKey for String {
    fn to_format(&self) -> Option<Format> {
        Format::parse(self)
    }
}

/// The domain whose converter handles `format` by default.
pub fn domain_for(format: Format) -> Domain {
    use Format::*;
    match format {
        Markdown | Docx | Doc | Pdf | Txt | Html | Odt | Rtf => Domain::Document,
        Ppt | Pptx | Png | Jpeg => Domain::Presentation,
        Csv | Xlsx | Xls | Json | Tsv | Ods => Domain::Spreadsheet,
    }
}

#[derive(Debug)]
pub struct ConverterFactory {
    toolbox: Arc<Toolbox>,
    converters: [OnceCell<Arc<Converter>>; 3],
}

impl ConverterFactory {
    /// Tools are probed on first use.
    pub fn new(config: EngineConfig) -> Self {
        Self::from_toolbox(Toolbox::new(config))
    }

    /// Skip probing and use a fixed availability snapshot.
    pub fn with_availability(config: EngineConfig, availability: ToolAvailability) -> Self {
        Self::from_toolbox(Toolbox::with_availability(config, availability))
    }

    fn from_toolbox(toolbox: Toolbox) -> Self {
        Self {
            toolbox: Arc::new(toolbox),
            converters: Default::default(),
        }
    }

    /// A factory over the same configuration whose tools are detected again
    /// on first use. Converters taken from `self` keep the old snapshot.
    pub fn refresh_tools(self) -> Self {
        debug!("Discarding tool snapshot");
        Self::new(self.config().clone())
    }

    pub fn toolbox(&self) -> &Arc<Toolbox> {
        &self.toolbox
    }

    pub fn config(&self) -> &EngineConfig {
        self.toolbox.config()
    }

    fn slot(domain: Domain) -> usize {
        match domain {
            Domain::Document => 0,
            Domain::Presentation => 1,
            Domain::Spreadsheet => 2,
        }
    }

    /// The shared converter for `domain`.
    pub fn converter(&self, domain: Domain) -> Arc<Converter> {
        self.converters[Self::slot(domain)]
            .get_or_init(|| {
                debug!("Creating {} converter", domain);
                Arc::new(Converter::new(domain, Arc::clone(&self.toolbox)))
            })
            .clone()
    }

    /// The converter mapped to `format`, or `None` for an unknown token.
    pub fn get_converter(&self, format: impl FormatKey) -> Option<Arc<Converter>> {
        format.to_format().map(|f| self.converter(domain_for(f)))
    }

    /// A converter able to take `from` to `to`: the one mapped to `from`
    /// when it declares the pair, otherwise the first domain that does.
    pub fn route_for(&self, from: Format, to: Format) -> Option<Arc<Converter>> {
        let preferred = domain_for(from);
        std::iter::once(preferred)
            .chain(Domain::ALL.into_iter().filter(|d| *d != preferred))
            .find(|d| {
                let caps = d.capabilities();
                caps.accepts(from) && caps.produces(to)
            })
            .map(|d| self.converter(d))
    }

    /// The converter `request` should go to. When no domain declares the
    /// pair, the one mapped to the input format, which then reports
    /// exactly which end is unsupported.
    pub fn converter_for(&self, request: &ConversionRequest) -> Arc<Converter> {
        let from = request
            .input_format
            .or_else(|| Format::from_path(&request.input));
        match from {
            Some(from) => self
                .route_for(from, request.target)
                .unwrap_or_else(|| self.converter(domain_for(from))),
            None => self.converter(domain_for(request.target)),
        }
    }

    /// Every format some converter is mapped to, in canonical order.
    pub fn supported_formats(&self) -> Vec<Format> {
        Format::ALL.to_vec()
    }

    pub fn is_format_supported(&self, token: &str) -> bool {
        Format::parse(token).is_some()
    }

    /// Check that every format in any capability table is mapped to a
    /// converter that declares it.
    ///
    /// A format declared by several domains (pdf and html are listed by
    /// presentation but map to document) only needs its mapped converter to
    /// declare it; [`Self::route_for`] reaches the others.
    pub fn validate(&self) -> Result<(), ConvertError> {
        let mut orphans = Vec::new();
        for domain in Domain::ALL {
            let caps = domain.capabilities();
            for &format in caps.inputs.iter().chain(caps.outputs) {
                let mapped = domain_for(format).capabilities();
                if !mapped.accepts(format) && !mapped.produces(format) {
                    orphans.push(format!("{format} ({domain})"));
                }
            }
        }
        orphans.sort();
        orphans.dedup();
        if orphans.is_empty() {
            Ok(())
        } else {
            Err(ConvertError::InvalidConfig(format!(
                "Formats without a declaring converter: {}",
                orphans.join(", ")
            )))
        }
    }
}
