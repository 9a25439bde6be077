//! Instance collection
//!
//! Produces the instances affected by the outage from the directory, one at
//! a time. Three mutually exclusive filters are supported, in priority order:
//! an explicit id list, a host set expanded from a node expression, and the
//! default zone/status scan which pages through every instance by marker.
//!
//! Every instance id is yielded at most once.

use anyhow::{Context, Result};
use outage_common::{nodeset, Instance};
use outage_directory::{DirectoryService, InstanceQuery};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use tracing::{debug, info, warn};

/// Which instances are affected by the outage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceFilter {
    /// Exactly these instances; an unknown id aborts the run
    Ids(Vec<String>),

    /// Every instance on the hosts named by a node expression
    Hosts(String),

    /// Every instance in a zone (case-insensitive), optionally with a status
    ZoneStatus {
        zone: Option<String>,
        status: Option<String>,
    },
}

enum Cursor {
    Ids(std::vec::IntoIter<String>),
    Hosts {
        hosts: std::vec::IntoIter<String>,
        buffer: VecDeque<Instance>,
    },
    Pages(Pager),
    Done,
}

/// Marker-driven walk over the full instance listing
struct Pager {
    zone: Option<String>,
    status: Option<String>,
    page_size: Option<usize>,
    marker: Option<String>,
    buffer: VecDeque<Instance>,
    pages: usize,
    exhausted: bool,
}

impl Pager {
    fn new(zone: Option<String>, status: Option<String>, page_size: Option<usize>) -> Self {
        Self {
            zone,
            status,
            page_size,
            marker: None,
            buffer: VecDeque::new(),
            pages: 0,
            exhausted: false,
        }
    }

    fn accepts(&self, instance: &Instance) -> bool {
        if let Some(zone) = &self.zone {
            if !instance.in_zone(zone) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if &instance.status != status {
                return false;
            }
        }
        true
    }

    /// Ids are recorded in `seen` as they are fetched, so everything
    /// returned is already unique
    async fn next(
        &mut self,
        directory: &dyn DirectoryService,
        seen: &mut HashSet<String>,
    ) -> Result<Option<Instance>> {
        loop {
            if let Some(instance) = self.buffer.pop_front() {
                return Ok(Some(instance));
            }
            if self.exhausted {
                return Ok(None);
            }

            let query = InstanceQuery::all()
                .with_status(self.status.clone())
                .after(self.marker.clone())
                .with_limit(self.page_size);

            let page = directory
                .list_instances(&query)
                .await
                .with_context(|| format!("Failed to list instances (marker {:?})", self.marker))?;
            self.pages += 1;

            let Some(last) = page.last() else {
                debug!("Empty page after {} pages, instance listing complete", self.pages - 1);
                self.exhausted = true;
                continue;
            };
            self.marker = Some(last.id.clone());

            let mut fresh = 0;
            for instance in page {
                if !seen.insert(instance.id.clone()) {
                    continue;
                }
                fresh += 1;
                if self.accepts(&instance) {
                    self.buffer.push_back(instance);
                }
            }

            if fresh == 0 {
                warn!(
                    "Page {} only repeated instances already seen, stopping the listing",
                    self.pages
                );
                self.exhausted = true;
            }
        }
    }
}

/// Lazy, single-pass sequence of affected instances
pub struct InstanceCollector<'a> {
    directory: &'a dyn DirectoryService,
    cursor: Cursor,
    seen: HashSet<String>,
}

impl<'a> InstanceCollector<'a> {
    /// Create a collector; node expressions are expanded eagerly so that a
    /// malformed expression fails before any directory query
    pub fn new(directory: &'a dyn DirectoryService, filter: InstanceFilter) -> Result<Self> {
        Self::with_page_size(directory, filter, None)
    }

    /// Create a collector requesting pages of at most `page_size` instances
    pub fn with_page_size(
        directory: &'a dyn DirectoryService,
        filter: InstanceFilter,
        page_size: Option<usize>,
    ) -> Result<Self> {
        let cursor = match filter {
            InstanceFilter::Ids(ids) => {
                info!("Collecting {} instances by id", ids.len());
                Cursor::Ids(ids.into_iter())
            }
            InstanceFilter::Hosts(expr) => {
                let mut hosts: Vec<String> = nodeset::expand(&expr)
                    .with_context(|| format!("Invalid node expression '{}'", expr))?
                    .into_iter()
                    .collect();
                hosts.sort();
                info!("Collecting instances from {} hosts", hosts.len());
                Cursor::Hosts {
                    hosts: hosts.into_iter(),
                    buffer: VecDeque::new(),
                }
            }
            InstanceFilter::ZoneStatus { zone, status } => {
                info!(
                    "Collecting instances (zone: {}, status: {})",
                    zone.as_deref().unwrap_or("any"),
                    status.as_deref().unwrap_or("any")
                );
                Cursor::Pages(Pager::new(zone, status, page_size))
            }
        };

        Ok(Self {
            directory,
            cursor,
            seen: HashSet::new(),
        })
    }

    /// The next affected instance, or `None` once the filter is exhausted
    pub async fn next(&mut self) -> Result<Option<Instance>> {
        loop {
            let candidate = match &mut self.cursor {
                Cursor::Ids(ids) => match ids.next() {
                    Some(id) => Some(
                        self.directory
                            .get_instance(&id)
                            .await
                            .with_context(|| format!("Failed to look up instance {}", id))?,
                    ),
                    None => None,
                },
                Cursor::Hosts { hosts, buffer } => loop {
                    if let Some(instance) = buffer.pop_front() {
                        break Some(instance);
                    }
                    let Some(host) = hosts.next() else {
                        break None;
                    };

                    let on_host = self
                        .directory
                        .list_instances(&InstanceQuery::all().on_host(host.clone()))
                        .await
                        .with_context(|| format!("Failed to list instances on host {}", host))?;
                    debug!("Host {}: {} instances", host, on_host.len());
                    buffer.extend(on_host);
                },
                Cursor::Pages(pager) => {
                    let next = pager.next(self.directory, &mut self.seen).await?;
                    if next.is_none() {
                        self.cursor = Cursor::Done;
                    }
                    return Ok(next);
                }
                Cursor::Done => None,
            };

            match candidate {
                None => {
                    self.cursor = Cursor::Done;
                    return Ok(None);
                }
                Some(instance) => {
                    if self.seen.insert(instance.id.clone()) {
                        return Ok(Some(instance));
                    }
                    debug!("Skipping duplicate instance {}", instance.id);
                }
            }
        }
    }

    /// Drain the collector
    pub async fn collect_all(mut self) -> Result<Vec<Instance>> {
        let mut instances = Vec::new();
        while let Some(instance) = self.next().await? {
            instances.push(instance);
        }
        Ok(instances)
    }
}

/// Read an instance id list: one id per line, blank lines and `#` comments
/// ignored, duplicates dropped
pub async fn read_instance_ids(path: &Path) -> Result<Vec<String>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read instance list {}", path.display()))?;

    let ids = parse_instance_ids(&contents);
    if ids.is_empty() {
        anyhow::bail!("Instance list {} contains no instance ids", path.display());
    }

    Ok(ids)
}

fn parse_instance_ids(contents: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}
