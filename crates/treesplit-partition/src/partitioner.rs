//! Greedy first-fit walk that splits a tree into balanced buckets.

use tracing::{debug, info, warn};

use treesplit_core::{
    AggregateSource, DirEntry, DirectorySnapshot, Metric, OutputMode, PartitionConfig, PathStyle,
    SourceError,
};

use crate::bucket::Bucket;
use crate::error::{PartitionError, PartitionWarning, PartitionWarningKind};
use crate::folder::Folder;

/// Splits the tree below a root into `config.buckets` buckets of roughly
/// equal aggregate size.
///
/// Directories are only queried when they do not fit whole in the open
/// bucket, so a run issues far fewer queries than a full walk would. Path
/// lists cannot name what a capped listing leaves out, so in
/// [`OutputMode::Paths`] every query asks for the full listing.
#[derive(Debug)]
pub struct Partitioner<S> {
    source: S,
    config: PartitionConfig,
}

impl<S: AggregateSource> Partitioner<S> {
    pub fn new(source: S, config: PartitionConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Partition everything below `root`.
    ///
    /// Fails before any bucket is created when there is nothing to divide,
    /// and aborts on the first failed aggregate query.
    pub fn run(&self, root: &str) -> Result<Partition, PartitionError> {
        let requested = self.config.buckets;
        if requested == 0 {
            return Err(PartitionError::degenerate("bucket count must be at least 1"));
        }

        let root = normalize_root(root);
        let metric = self.config.metric;
        info!("Gathering {} aggregates at {} for {} buckets", metric, root, requested);

        let snapshot = query(&self.source, &self.config, &root)?;
        if snapshot.total == 0 {
            return Err(PartitionError::degenerate(format!(
                "{root} has a {metric} total of zero"
            )));
        }

        let total = snapshot.total;
        let capacity = total / requested as u64;
        debug!(total, capacity, "Computed bucket capacity");

        let mut walk = Walk {
            source: &self.source,
            config: &self.config,
            root,
            total,
            capacity,
            current: Bucket::new(1, bucket_capacity(1, requested, total, capacity), self.config.mode),
            closed: Vec::new(),
            path: Vec::new(),
            handled: Vec::new(),
            warnings: Vec::new(),
        };
        walk.descend("/".to_string(), snapshot)?;

        Ok(walk.finish())
    }
}

fn query<S: AggregateSource>(
    source: &S,
    config: &PartitionConfig,
    path: &str,
) -> Result<DirectorySnapshot, SourceError> {
    match config.mode {
        OutputMode::Rules => source.aggregate(path, config.metric),
        OutputMode::Paths => source.aggregate_all(path, config.metric),
    }
}

/// Ensure the query root ends with a `/`.
fn normalize_root(root: &str) -> String {
    let mut root = root.trim_end_matches('/').to_string();
    root.push('/');
    root
}

/// The last bucket also takes the remainder of the integer division.
fn bucket_capacity(index: usize, requested: usize, total: u64, capacity: u64) -> u64 {
    if index >= requested {
        total.saturating_sub(capacity * (requested as u64 - 1))
    } else {
        capacity
    }
}

/// Mutable state of one run, threaded through the recursive descent.
struct Walk<'a, S> {
    source: &'a S,
    config: &'a PartitionConfig,
    root: String,
    total: u64,
    capacity: u64,
    current: Bucket,
    closed: Vec<Bucket>,
    /// `"/"` followed by one `"name/"` per directory level.
    path: Vec<String>,
    /// Anchored paths of children already claimed, one frame per level.
    handled: Vec<Vec<String>>,
    warnings: Vec<PartitionWarning>,
}

impl<S: AggregateSource> Walk<'_, S> {
    fn descend(&mut self, name: String, snapshot: DirectorySnapshot) -> Result<(), PartitionError> {
        self.path.push(name);
        self.handled.push(Vec::new());

        if !snapshot.is_consistent() {
            self.warn(
                PartitionWarningKind::InconsistentAggregate,
                format!(
                    "listed children add up to {} but the directory reports {}",
                    snapshot.listed_total(),
                    snapshot.total
                ),
            );
        }

        let mut folder = Folder::new(snapshot);
        let result = self.consume(&mut folder);

        self.path.pop();
        self.handled.pop();
        result
    }

    fn consume(&mut self, folder: &mut Folder) -> Result<(), PartitionError> {
        loop {
            if self.absorb_remaining(folder) {
                return Ok(());
            }
            let Some(entry) = folder.pop() else {
                return Ok(());
            };

            if self.current.fits(entry.size) {
                self.claim(&entry);
            } else if entry.is_dir() {
                let path = format!("{}{}/", self.query_path(), entry.name);
                let snapshot = query(self.source, self.config, &path)?;
                if snapshot.total != entry.size {
                    debug!(
                        path = %path,
                        listed = entry.size,
                        reported = snapshot.total,
                        "Directory aggregate drifted since its parent was listed"
                    );
                }
                self.descend(format!("{}/", entry.name), snapshot)?;
                self.mark_handled(&entry);
            } else if self.current.entries().is_empty() {
                // Overfill rather than leave a bucket with nothing in it.
                self.claim(&entry);
            } else if self.on_last_bucket() {
                self.warn(
                    PartitionWarningKind::CapacityExhausted,
                    format!(
                        "{} ({}) does not fit and no buckets are left; overfilling bucket {}",
                        entry.name,
                        entry.size,
                        self.current.index()
                    ),
                );
                self.claim(&entry);
            } else {
                self.rotate();
                if !folder.is_empty() || !self.config.wildcards {
                    self.claim(&entry);
                } else {
                    folder.reclaim(entry);
                }
            }
        }
    }

    /// Claim the whole remainder of the directory when allowed. Returns
    /// whether the directory is done.
    fn absorb_remaining(&mut self, folder: &Folder) -> bool {
        if self.config.wildcards {
            let absorb = folder.is_empty()
                || folder.is_reclaimed()
                || self.on_last_bucket()
                || self.current.fits(folder.remaining_total());
            if absorb {
                self.claim_remaining(folder);
            }
            return absorb;
        }

        if !folder.is_empty() {
            return false;
        }
        if folder.extra() > 0 {
            if self.config.mode == OutputMode::Rules {
                self.warn(
                    PartitionWarningKind::UncoveredExtra,
                    format!(
                        "{} unlisted items claimed with a wildcard include",
                        folder.extra()
                    ),
                );
            }
            self.claim_remaining(folder);
        }
        true
    }

    fn claim(&mut self, entry: &DirEntry) {
        let suffix = if entry.is_dir() { "/" } else { "" };
        let anchored = format!("{}{}{}", self.path.concat(), entry.name, suffix);
        let relative = format!("{}{}{}", self.relative(), entry.name, suffix);

        if let Some(filter) = self.current.filter_mut() {
            filter.include_item(&self.path, &self.handled, &anchored);
        }
        self.current.add(relative, entry.size);
        if let Some(frame) = self.handled.last_mut() {
            frame.push(anchored);
        }
    }

    fn mark_handled(&mut self, entry: &DirEntry) {
        let anchored = format!("{}{}/", self.path.concat(), entry.name);
        if let Some(frame) = self.handled.last_mut() {
            frame.push(anchored);
        }
    }

    fn claim_remaining(&mut self, folder: &Folder) {
        let size = folder.remaining_total();
        let relative = self.relative();

        if let Some(filter) = self.current.filter_mut() {
            filter.include_remaining(&self.path, &self.handled);
            self.current.add(format!("{relative}*"), size);
            return;
        }

        let untouched = self.path.len() > 1 && self.handled.last().is_some_and(Vec::is_empty);
        if untouched {
            self.current.add(relative, size);
            return;
        }

        for entry in folder.pending() {
            let suffix = if entry.is_dir() { "/" } else { "" };
            self.current
                .add(format!("{relative}{}{suffix}", entry.name), entry.size);
        }
        if folder.extra() > 0 {
            let extra = folder.extra() as u64;
            self.current.charge(extra);
            self.warn(
                PartitionWarningKind::UncoveredExtra,
                format!("{extra} unlisted items cannot be written as paths"),
            );
        }
    }

    /// Close the open bucket and open the next one.
    fn rotate(&mut self) {
        if let Some(filter) = self.current.filter_mut() {
            filter.finish(&self.path);
        }
        self.current.close();
        log_filled(&self.current, self.config.metric);

        let index = self.current.index() + 1;
        let capacity = bucket_capacity(index, self.config.buckets, self.total, self.capacity);
        let next = Bucket::new(index, capacity, self.config.mode);
        let done = std::mem::replace(&mut self.current, next);
        self.closed.push(done);
    }

    fn on_last_bucket(&self) -> bool {
        self.current.index() >= self.config.buckets
    }

    /// Current directory relative to the root, with a trailing `/`.
    fn relative(&self) -> String {
        self.path.get(1..).map(|rest| rest.concat()).unwrap_or_default()
    }

    fn query_path(&self) -> String {
        format!("{}{}", self.root, self.relative())
    }

    fn warn(&mut self, kind: PartitionWarningKind, message: String) {
        let path = self.query_path();
        warn!(path = %path, ?kind, "{message}");
        self.warnings.push(PartitionWarning::new(path, message, kind));
    }

    fn finish(mut self) -> Partition {
        self.current.close();
        log_filled(&self.current, self.config.metric);
        self.closed.push(self.current);

        let created = self.closed.len();
        let requested = self.config.buckets;
        if created < requested {
            let message = format!(
                "the tree was used up after {created} of {requested} buckets; \
                 buckets {} to {requested} copy nothing",
                created + 1
            );
            warn!(path = %self.root, "{message}");
            self.warnings.push(PartitionWarning::new(
                self.root.clone(),
                message,
                PartitionWarningKind::BucketShortfall,
            ));

            let root = ["/".to_string()];
            for index in created + 1..=requested {
                let capacity = bucket_capacity(index, requested, self.total, self.capacity);
                let mut bucket = Bucket::new(index, capacity, self.config.mode);
                if let Some(filter) = bucket.filter_mut() {
                    filter.finish(&root);
                }
                bucket.close();
                self.closed.push(bucket);
            }
        }

        Partition {
            root: self.root,
            metric: self.config.metric,
            mode: self.config.mode,
            path_style: self.config.path_style.clone(),
            requested: self.config.buckets,
            total: self.total,
            capacity: self.capacity,
            buckets: self.closed,
            warnings: self.warnings,
        }
    }
}

fn log_filled(bucket: &Bucket, metric: Metric) {
    info!(
        used = bucket.used(),
        capacity = bucket.capacity(),
        entries = bucket.entries().len(),
        "Filled bucket {} ({metric})",
        bucket.index()
    );
}

/// Result of a partitioning run.
#[derive(Debug)]
pub struct Partition {
    root: String,
    metric: Metric,
    mode: OutputMode,
    path_style: PathStyle,
    requested: usize,
    total: u64,
    capacity: u64,
    buckets: Vec<Bucket>,
    warnings: Vec<PartitionWarning>,
}

impl Partition {
    /// Query root, with a trailing `/`.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn path_style(&self) -> &PathStyle {
        &self.path_style
    }

    /// Bucket count the run was asked for.
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Aggregate of the root as reported by the source.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Nominal per-bucket capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn warnings(&self) -> &[PartitionWarning] {
        &self.warnings
    }

    /// Output lines for every bucket, in bucket order.
    pub fn render(&self) -> Vec<Vec<String>> {
        self.buckets
            .iter()
            .map(|bucket| bucket.render(&self.path_style))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treesplit_core::{DirEntry, MemorySource};

    fn rules_of(partition: &Partition, index: usize) -> Vec<String> {
        partition.buckets()[index]
            .rules()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn paths_of(partition: &Partition, index: usize) -> Vec<&str> {
        partition.buckets()[index]
            .entries()
            .iter()
            .map(|e| e.path.as_str())
            .collect()
    }

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize_root("/media"), "/media/");
        assert_eq!(normalize_root("/media/"), "/media/");
        assert_eq!(normalize_root("/"), "/");
        assert_eq!(normalize_root(""), "/");
    }

    #[test]
    fn test_last_bucket_takes_remainder() {
        assert_eq!(bucket_capacity(1, 3, 100, 33), 33);
        assert_eq!(bucket_capacity(3, 3, 100, 33), 34);
        assert_eq!(bucket_capacity(1, 1, 7, 7), 7);
    }

    #[test]
    fn test_two_way_split_with_nested_directory() {
        let source = MemorySource::new()
            .with_listing(
                "/",
                vec![DirEntry::directory("a", 100), DirEntry::file("b", 50)],
            )
            .with_listing("/a", vec![DirEntry::file("x", 60), DirEntry::file("y", 40)]);

        let partition = Partitioner::new(&source, PartitionConfig::new(2))
            .run("/")
            .unwrap();

        assert_eq!(partition.buckets().len(), 2);
        assert_eq!(partition.capacity(), 75);
        assert_eq!(
            rules_of(&partition, 0),
            vec!["+ /", "+ /a/", "+ /a/x", "- /a/*", "- /*"]
        );
        assert_eq!(
            rules_of(&partition, 1),
            vec!["+ /", "+ /a/", "- /a/x", "+ /a/*", "+ /*"]
        );
        assert_eq!(partition.buckets()[0].used(), 60);
        assert_eq!(partition.buckets()[1].used(), 90);
        assert!(partition.warnings().is_empty());
    }

    #[test]
    fn test_flat_mode_lists_directories() {
        let source = MemorySource::new()
            .with_listing(
                "/",
                vec![DirEntry::directory("a", 100), DirEntry::directory("b", 50)],
            )
            .with_listing("/a", vec![DirEntry::file("x", 60), DirEntry::file("y", 40)]);
        let config = PartitionConfig::builder()
            .buckets(2usize)
            .mode(OutputMode::Paths)
            .build()
            .unwrap();

        let partition = Partitioner::new(&source, config).run("/").unwrap();

        assert_eq!(paths_of(&partition, 0), vec!["a/x"]);
        assert_eq!(paths_of(&partition, 1), vec!["a/y", "b/"]);
    }

    #[test]
    fn test_reclaimed_last_child() {
        // y does not fit and is the last child: it is pushed back and the
        // next bucket claims the directory remainder instead.
        let source = MemorySource::new()
            .with_listing("/", vec![DirEntry::directory("d", 100), DirEntry::file("z", 20)])
            .with_listing("/d", vec![DirEntry::file("x", 50), DirEntry::file("y", 50)]);
        let config = PartitionConfig::new(3);

        let partition = Partitioner::new(&source, config).run("/").unwrap();

        // capacity 40: x overfills bucket 1, y is reclaimed into bucket 2
        assert_eq!(
            rules_of(&partition, 0),
            vec!["+ /", "+ /d/", "+ /d/x", "- /d/*", "- /*"]
        );
        assert_eq!(
            rules_of(&partition, 1),
            vec!["+ /", "+ /d/", "- /d/x", "+ /d/*", "- /*"]
        );
        assert_eq!(rules_of(&partition, 2), vec!["+ /", "- /d/", "+ /*"]);
    }

    #[test]
    fn test_unused_buckets_copy_nothing() {
        // big overfills bucket 1 and small takes bucket 2 whole.
        let source = MemorySource::new().with_listing(
            "/",
            vec![DirEntry::file("big", 90), DirEntry::file("small", 10)],
        );

        let partition = Partitioner::new(&source, PartitionConfig::new(3))
            .run("/")
            .unwrap();

        assert_eq!(partition.buckets().len(), 3);
        assert_eq!(rules_of(&partition, 0), vec!["+ /", "+ /big", "- /*"]);
        assert_eq!(rules_of(&partition, 1), vec!["+ /", "- /big", "+ /*"]);
        assert_eq!(rules_of(&partition, 2), vec!["- /*"]);
        assert_eq!(partition.buckets()[2].used(), 0);
        assert_eq!(partition.buckets()[2].capacity(), 34);
        assert!(partition.buckets()[2].is_closed());
        assert!(partition
            .warnings()
            .iter()
            .any(|w| w.kind == PartitionWarningKind::BucketShortfall));

        let config = PartitionConfig::builder()
            .buckets(3usize)
            .mode(OutputMode::Paths)
            .build()
            .unwrap();
        let flat = Partitioner::new(&source, config).run("/").unwrap();
        assert_eq!(flat.render(), vec![vec!["big"], vec!["small"], Vec::<&str>::new()]);
    }

    #[test]
    fn test_no_wildcards_visits_every_leaf() {
        let source = MemorySource::new().with_listing(
            "/",
            vec![DirEntry::file("a", 1), DirEntry::file("b", 1)],
        );
        let config = PartitionConfig::builder()
            .buckets(1usize)
            .wildcards(false)
            .build()
            .unwrap();

        let partition = Partitioner::new(&source, config).run("/").unwrap();

        assert_eq!(rules_of(&partition, 0), vec!["+ /", "+ /a", "+ /b"]);
    }

    #[test]
    fn test_degenerate_total() {
        let source = MemorySource::new().with_listing("/", Vec::new());
        let err = Partitioner::new(&source, PartitionConfig::new(2))
            .run("/")
            .unwrap_err();
        assert!(matches!(err, PartitionError::DivisionDegenerate { .. }));
    }
}
