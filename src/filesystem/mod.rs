//! Read-only project inspection: navigation, search, file finding and reads

pub mod config;
pub mod content;
pub mod external;
pub mod finder;
pub mod navigator;
pub mod path_utils;
pub mod reader;
pub mod search;
pub mod security;
pub mod tools;
pub mod walk;


use std::sync::Arc;

use config::ProjectConfig;
use finder::FileFinder;
use navigator::Navigator;
use reader::FileReader;
use search::SearchEngine;
use security::PathValidator;
use tools::ToolAvailability;

use crate::protocol::ToolError;

pub struct ProjectService {
    config: Arc<ProjectConfig>,
    tools: ToolAvailability,
    navigator: Navigator,
    search: SearchEngine,
    finder: FileFinder,
    reader: FileReader,
}

impl ProjectService {
    pub fn new(config: ProjectConfig, tools: ToolAvailability) -> Result<Self, ToolError> {
        let config = Arc::new(config);
        let validator = Arc::new(PathValidator::new(config.clone())?);
        let navigator = Navigator::new(validator.clone());
        let search = SearchEngine::new(config.clone(), validator.clone(), &tools);
        let finder = FileFinder::new(config.clone(), validator.clone(), &tools);
        let reader = FileReader::new(validator);
        Ok(Self {
            config,
            tools,
            navigator,
            search,
            finder,
            reader,
        })
    }

    pub fn config(&self) -> &ProjectConfig {
        self.config.as_ref()
    }

    pub fn tools(&self) -> &ToolAvailability {
        &self.tools
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn search(&self) -> &SearchEngine {
        &self.search
    }

    pub fn finder(&self) -> &FileFinder {
        &self.finder
    }

    pub fn reader(&self) -> &FileReader {
        &self.reader
    }
}
