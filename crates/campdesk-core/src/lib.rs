pub mod collate;
pub mod compile;
pub mod error;
pub mod record;
pub mod service;
pub mod settings;
pub mod store;
pub mod tree;
pub mod view;

pub use compile::{compile, Compilation, CompileReport};
pub use error::{Error, Result};
pub use record::{normalize, CanonicalNode, NodeKind, DEFAULT_PARTITION};
pub use service::CampaignService;
pub use settings::{home_dir, read_settings, write_settings, Settings};
pub use store::{CollectionStore, JsonCollectionFile, JsonViewFile, ViewStore};
pub use tree::{build, Forest};
pub use view::{serialize, view_schema, CompiledView, OutputNode, Partition};

/// Service over the file-backed stores named in `settings`.
pub type FileService = CampaignService<JsonCollectionFile, JsonViewFile>;

/// Open the file-backed service rooted at `home`.
pub fn open(home: &std::path::Path) -> FileService {
    let settings = read_settings(home);
    CampaignService::new(settings.collection_store(home), settings.view_store(home))
}
