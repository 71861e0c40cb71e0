pub mod audit;
pub mod content;
pub mod dimension;
pub mod glossary;

pub use audit::{
    AcquisitionMode, Audit, AuditKind, AuditRequest, AuditStatus, ImageLabel, LabeledImage,
    Locator, Progress, UsageMetrics,
};
pub use content::{ContentPairs, Heading, HeadingPair, ImagePair, IndexedPair, ScrapedContent, TextPair};
pub use dimension::{Dimension, DimensionResult, Finding, GoodExample, Severity};
pub use glossary::{Glossary, GlossaryTerm};
