use std::sync::Arc;

use stock_checker::config::{DashboardConfig, DatasetConfig};
use stock_checker::data::cache::FetchCache;
use stock_checker::data::fetch::{FetchError, FetchedTable, Fetcher};
use stock_checker::data::filter::{
    apply, default_filters, ExcludeRule, FilterSpec, FilterState, FilteredView,
};

// ---------------------------------------------------------------------------
// Per-dataset panel state
// ---------------------------------------------------------------------------

/// Everything one dataset panel needs, independent of rendering.
pub struct PanelState {
    pub dataset: DatasetConfig,

    /// `None` until the first fetch attempt; a failure stays local to this panel.
    pub loaded: Option<Result<Arc<FetchedTable>, FetchError>>,

    /// Columns shown in the result table, in display order.
    pub selected_columns: Vec<String>,

    /// Columns with a filter widget, in the order they were added.
    pub filter_columns: Vec<String>,

    /// Current spec per filtered column.
    pub filters: FilterState,

    /// Starting spec for each column, built once per loaded table.
    pub filter_defaults: Vec<(String, FilterSpec)>,

    /// Opt-in to rows hidden by the dataset's exclude rule.
    pub show_excluded: bool,

    /// Result of the last recomputation.
    pub view: Option<FilteredView>,
}

impl PanelState {
    pub fn new(dataset: DatasetConfig) -> Self {
        Self {
            dataset,
            loaded: None,
            selected_columns: Vec::new(),
            filter_columns: Vec::new(),
            filters: FilterState::new(),
            filter_defaults: Vec::new(),
            show_excluded: false,
            view: None,
        }
    }

    pub fn fetched(&self) -> Option<&FetchedTable> {
        match &self.loaded {
            Some(Ok(fetched)) => Some(fetched),
            _ => None,
        }
    }

    /// Ingest a fetch outcome. The first table preselects the default columns;
    /// a refreshed table keeps the user's columns and filters that still exist.
    pub fn set_loaded(&mut self, result: Result<Arc<FetchedTable>, FetchError>) {
        if let Ok(fetched) = &result {
            let table = &fetched.table;
            if self.fetched().is_some() {
                self.selected_columns.retain(|c| table.has_column(c));
                self.filter_columns.retain(|c| table.has_column(c));
                self.filters.retain(|c, _| table.has_column(c));
            } else {
                self.selected_columns = if self.dataset.default_columns.is_empty() {
                    table.column_names()
                } else {
                    self.dataset
                        .default_columns
                        .iter()
                        .filter(|c| table.has_column(c))
                        .cloned()
                        .collect()
                };
                self.filter_columns.clear();
                self.filters.clear();
            }
            self.filter_defaults = default_filters(table, &table.column_names());
        }
        self.loaded = Some(result);
        self.refilter();
    }

    fn exclude_rule(&self) -> Option<ExcludeRule> {
        if self.show_excluded {
            return None;
        }
        self.dataset.exclude.as_ref().map(|e| e.rule())
    }

    /// Recompute the filtered view from the current inputs.
    pub fn refilter(&mut self) {
        let exclude = self.exclude_rule();
        self.view = self.fetched().map(|fetched| {
            apply(
                &fetched.table,
                &self.selected_columns,
                &self.filters,
                exclude.as_ref(),
            )
        });
    }

    pub fn toggle_column(&mut self, column: &str) {
        if let Some(pos) = self.selected_columns.iter().position(|c| c == column) {
            self.selected_columns.remove(pos);
        } else {
            self.selected_columns.push(column.to_string());
        }
        self.refilter();
    }

    /// Add a filter widget for `column` starting from its default spec, or
    /// remove it if present.
    pub fn toggle_filter_column(&mut self, column: &str) {
        if let Some(pos) = self.filter_columns.iter().position(|c| c == column) {
            self.filter_columns.remove(pos);
            self.filters.remove(column);
        } else {
            let spec = self
                .filter_defaults
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, spec)| spec.clone());
            if let Some(spec) = spec {
                self.filter_columns.push(column.to_string());
                self.filters.insert(column.to_string(), spec);
            }
        }
        self.refilter();
    }

    pub fn set_filter(&mut self, column: &str, spec: FilterSpec) {
        self.filters.insert(column.to_string(), spec);
        self.refilter();
    }

    pub fn set_show_excluded(&mut self, show: bool) {
        self.show_excluded = show;
        self.refilter();
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub panels: Vec<PanelState>,

    /// Index of the panel being shown.
    pub active: usize,

    /// `None` when the config could not produce a fetcher.
    fetcher: Option<Fetcher>,

    cache: FetchCache,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        match config.build_fetcher() {
            Ok(fetcher) => Self::with_fetcher(&config, Some(fetcher)),
            Err(e) => {
                log::error!("Cannot set up downloads: {e:#}");
                let mut state = Self::with_fetcher(&config, None);
                state.status_message = Some(format!("Error: {e:#}"));
                state
            }
        }
    }

    pub fn with_fetcher(config: &DashboardConfig, fetcher: Option<Fetcher>) -> Self {
        Self {
            panels: config.datasets.iter().cloned().map(PanelState::new).collect(),
            active: 0,
            fetcher,
            cache: FetchCache::new(config.cache_ttl()),
            status_message: None,
        }
    }

    /// Fetch the panel's dataset if it was never attempted, or refetch it
    /// once its cache entry has expired. A failed panel waits for
    /// [`AppState::reload`].
    pub fn ensure_loaded(&mut self, idx: usize) {
        let Some(panel) = self.panels.get(idx) else {
            return;
        };
        let stale = match &panel.loaded {
            None => true,
            Some(Ok(_)) => self.cache.get(&panel.dataset.id).is_none(),
            Some(Err(_)) => false,
        };
        if stale {
            self.load(idx);
        }
    }

    /// Drop the cached copy and fetch again.
    pub fn reload(&mut self, idx: usize) {
        if let Some(panel) = self.panels.get(idx) {
            self.cache.invalidate(&panel.dataset.id);
            self.load(idx);
        }
    }

    fn load(&mut self, idx: usize) {
        let Some(fetcher) = &self.fetcher else {
            return;
        };
        let Some(panel) = self.panels.get_mut(idx) else {
            return;
        };
        let result = self.cache.get_or_fetch(fetcher, &panel.dataset.id);
        if let Err(e) = &result {
            log::error!("Failed to load {}: {e}", panel.dataset.title);
        }
        panel.set_loaded(result);
    }
}
