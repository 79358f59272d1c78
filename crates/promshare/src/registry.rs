//! CollectorRegistry: metric identity, schema table and collection.
//!
//! The registry keeps one [`Binding`] per fully qualified name. A binding
//! ties the identity and schema to the shared store and the key codec; the
//! `Counter`/`Gauge`/`Histogram` handles are thin wrappers around it. No
//! numeric state is held here: every value lives in the [`StorageAdapter`].
//!
//! Schemas are also published to the store as JSON documents, so that a
//! process which never registered a family can still collect and render it.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use promshare_store::StorageAdapter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buckets::DEFAULT_BUCKETS;
use crate::codec::{KeyCodec, RecordTag};
use crate::counter::Counter;
use crate::error::{MetricsError, MetricsResult};
use crate::gauge::Gauge;
use crate::histogram::Histogram;
use crate::render::{format_value, render_prometheus};
use crate::types::{MetricFamilySamples, MetricIdentity, MetricKind, Sample, Schema};

/// Key namespace used when none is configured.
pub const DEFAULT_PREFIX: &str = "promshare";

/// A registered family bound to its storage.
pub(crate) struct Binding {
    pub(crate) identity: MetricIdentity,
    pub(crate) fqname: String,
    pub(crate) schema: Schema,
    pub(crate) store: Arc<dyn StorageAdapter>,
    codec: KeyCodec,
}

impl Binding {
    /// Storage key for one record of the series identified by `label_values`.
    pub(crate) fn key<S: AsRef<str>>(&self, label_values: &[S], tag: RecordTag) -> MetricsResult<String> {
        self.schema.check_values(label_values)?;
        Ok(self
            .codec
            .encode(self.identity.kind, &self.fqname, label_values, tag))
    }
}

/// Schema document published to the store's metadata keyspace.
#[derive(Debug, Serialize, Deserialize)]
struct SchemaDocument {
    #[serde(flatten)]
    identity: MetricIdentity,
    #[serde(flatten)]
    schema: Schema,
}

/// A handle of any kind, as returned by the kind-generic entry points.
#[derive(Clone)]
pub enum Metric {
    Counter(Counter),
    Gauge(Gauge),
    Histogram(Histogram),
}

impl Metric {
    fn from_binding(binding: Arc<Binding>) -> Self {
        match binding.identity.kind {
            MetricKind::Counter => Metric::Counter(Counter::new(binding)),
            MetricKind::Gauge => Metric::Gauge(Gauge::new(binding)),
            MetricKind::Histogram => Metric::Histogram(Histogram::new(binding)),
        }
    }

    pub fn identity(&self) -> &MetricIdentity {
        match self {
            Metric::Counter(c) => c.identity(),
            Metric::Gauge(g) => g.identity(),
            Metric::Histogram(h) => h.identity(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Register,
    GetOrRegister,
}

/// Values collected for one label set of one family.
#[derive(Default)]
struct Series {
    value: Option<f64>,
    sum: f64,
    buckets: Vec<(f64, f64)>,
}

/// Process-local schema table over a shared [`StorageAdapter`].
pub struct CollectorRegistry {
    store: Arc<dyn StorageAdapter>,
    codec: KeyCodec,
    default_buckets: Vec<f64>,
    metrics: RwLock<BTreeMap<String, Arc<Binding>>>,
}

impl CollectorRegistry {
    /// Create a registry over `store` using the default key namespace.
    pub fn new(store: Arc<dyn StorageAdapter>) -> Self {
        Self::with_codec(store, KeyCodec::default())
    }

    /// Create a registry whose records live under `prefix` in `store`.
    /// Fails with `InvalidArgument` when `prefix` is empty or contains a
    /// key separator.
    pub fn with_prefix(store: Arc<dyn StorageAdapter>, prefix: &str) -> MetricsResult<Self> {
        Ok(Self::with_codec(store, KeyCodec::new(prefix)?))
    }

    fn with_codec(store: Arc<dyn StorageAdapter>, codec: KeyCodec) -> Self {
        Self {
            store,
            codec,
            default_buckets: DEFAULT_BUCKETS.to_vec(),
            metrics: RwLock::new(BTreeMap::new()),
        }
    }

    /// Bucket bounds used by histograms registered without explicit bounds.
    pub fn with_default_buckets(mut self, buckets: Vec<f64>) -> MetricsResult<Self> {
        crate::types::validate_buckets(&buckets)?;
        self.default_buckets = buckets;
        Ok(self)
    }

    pub fn prefix(&self) -> &str {
        self.codec.prefix()
    }

    // ── Kind-generic entry points ──────────────────────────────────

    /// Register a new family. Fails if the name is already registered,
    /// whatever its schema.
    pub fn register(
        &self,
        kind: MetricKind,
        namespace: &str,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: Option<Vec<f64>>,
    ) -> MetricsResult<Metric> {
        self.bind(kind, namespace, name, help, label_names, buckets, Mode::Register)
            .map(Metric::from_binding)
    }

    /// Return the existing family when its schema matches exactly,
    /// registering it first if absent.
    pub fn get_or_register(
        &self,
        kind: MetricKind,
        namespace: &str,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: Option<Vec<f64>>,
    ) -> MetricsResult<Metric> {
        self.bind(kind, namespace, name, help, label_names, buckets, Mode::GetOrRegister)
            .map(Metric::from_binding)
    }

    // ── Typed entry points ─────────────────────────────────────────

    pub fn register_counter(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> MetricsResult<Counter> {
        self.bind(MetricKind::Counter, namespace, name, help, label_names, None, Mode::Register)
            .map(Counter::new)
    }

    pub fn get_or_register_counter(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> MetricsResult<Counter> {
        self.bind(MetricKind::Counter, namespace, name, help, label_names, None, Mode::GetOrRegister)
            .map(Counter::new)
    }

    pub fn get_counter(&self, namespace: &str, name: &str) -> MetricsResult<Counter> {
        self.lookup(MetricKind::Counter, namespace, name).map(Counter::new)
    }

    pub fn register_gauge(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> MetricsResult<Gauge> {
        self.bind(MetricKind::Gauge, namespace, name, help, label_names, None, Mode::Register)
            .map(Gauge::new)
    }

    pub fn get_or_register_gauge(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> MetricsResult<Gauge> {
        self.bind(MetricKind::Gauge, namespace, name, help, label_names, None, Mode::GetOrRegister)
            .map(Gauge::new)
    }

    pub fn get_gauge(&self, namespace: &str, name: &str) -> MetricsResult<Gauge> {
        self.lookup(MetricKind::Gauge, namespace, name).map(Gauge::new)
    }

    /// Register a histogram. `None` buckets selects the registry defaults.
    pub fn register_histogram(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: Option<Vec<f64>>,
    ) -> MetricsResult<Histogram> {
        self.bind(MetricKind::Histogram, namespace, name, help, label_names, buckets, Mode::Register)
            .map(Histogram::new)
    }

    pub fn get_or_register_histogram(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: Option<Vec<f64>>,
    ) -> MetricsResult<Histogram> {
        self.bind(
            MetricKind::Histogram,
            namespace,
            name,
            help,
            label_names,
            buckets,
            Mode::GetOrRegister,
        )
        .map(Histogram::new)
    }

    pub fn get_histogram(&self, namespace: &str, name: &str) -> MetricsResult<Histogram> {
        self.lookup(MetricKind::Histogram, namespace, name).map(Histogram::new)
    }

    // ── Registration ───────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn bind(
        &self,
        kind: MetricKind,
        namespace: &str,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: Option<Vec<f64>>,
        mode: Mode,
    ) -> MetricsResult<Arc<Binding>> {
        let identity = MetricIdentity::new(namespace, name, kind);
        identity.validate()?;

        let buckets = match kind {
            MetricKind::Histogram => buckets.unwrap_or_else(|| self.default_buckets.clone()),
            _ => buckets.unwrap_or_default(),
        };
        let schema = Schema::new(help, label_names).with_buckets(buckets);
        schema.validate(kind)?;

        let fqname = identity.fqname();
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = metrics.get(&fqname) {
            if let Some(reason) = schema_mismatch(existing, &identity, &schema) {
                return Err(MetricsError::duplicate(&fqname, reason));
            }
            return match mode {
                Mode::GetOrRegister => Ok(existing.clone()),
                Mode::Register => Err(MetricsError::duplicate(
                    &fqname,
                    "use get_or_register to reuse an existing family",
                )),
            };
        }

        let binding = Arc::new(Binding {
            identity,
            fqname: fqname.clone(),
            schema,
            store: self.store.clone(),
            codec: self.codec.clone(),
        });
        metrics.insert(fqname.clone(), binding.clone());
        drop(metrics);

        self.publish(&binding);
        debug!(
            metric = %fqname,
            %kind,
            labels = ?binding.schema.label_names,
            "metric registered"
        );
        Ok(binding)
    }

    fn lookup(&self, kind: MetricKind, namespace: &str, name: &str) -> MetricsResult<Arc<Binding>> {
        let fqname = crate::types::fqname(namespace, name);
        let metrics = self.metrics.read().unwrap_or_else(PoisonError::into_inner);
        match metrics.get(&fqname) {
            Some(b) if b.identity.kind == kind => Ok(b.clone()),
            Some(b) => Err(MetricsError::MetricNotFound(format!(
                "{fqname} is registered as a {}, not a {kind}",
                b.identity.kind
            ))),
            None => Err(MetricsError::MetricNotFound(fqname)),
        }
    }

    /// Best-effort: a failure leaves the schema usable in this process only.
    fn publish(&self, binding: &Binding) {
        let document = SchemaDocument {
            identity: binding.identity.clone(),
            schema: binding.schema.clone(),
        };
        let result = serde_json::to_string(&document)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                self.store
                    .put_meta(&self.codec.meta_key(&binding.fqname), &json)
                    .map_err(|e| e.to_string())
            });
        if let Err(error) = result {
            warn!(metric = %binding.fqname, %error, "failed to publish schema");
        }
    }

    /// The schema document published for `namespace`/`name`, if any
    /// registry sharing this store and prefix has published one.
    pub fn published_schema(
        &self,
        namespace: &str,
        name: &str,
    ) -> MetricsResult<Option<(MetricIdentity, Schema)>> {
        let key = self.codec.meta_key(&crate::types::fqname(namespace, name));
        let Some((_, json)) = self
            .store
            .enumerate_meta(&key)?
            .into_iter()
            .find(|(k, _)| *k == key)
        else {
            return Ok(None);
        };
        match serde_json::from_str::<SchemaDocument>(&json) {
            Ok(document) => Ok(Some((document.identity, document.schema))),
            Err(error) => {
                warn!(%key, %error, "skipping unreadable schema document");
                Ok(None)
            }
        }
    }

    // ── Collection ─────────────────────────────────────────────────

    /// Snapshot every family with at least one stored sample, ordered by
    /// name; samples ordered by label values, then bucket bound.
    ///
    /// Records that cannot be decoded or matched to a schema are skipped
    /// with a warning.
    pub fn collect(&self) -> MetricsResult<Vec<MetricFamilySamples>> {
        let schemas = self.known_schemas()?;
        let records = self.store.enumerate(&self.codec.scan_prefix())?;

        let mut families: BTreeMap<String, BTreeMap<Vec<String>, Series>> = BTreeMap::new();
        let mut skipped = 0usize;
        for (key, value) in records {
            let Some(decoded) = self.codec.decode(&key) else {
                warn!(%key, "skipping undecodable record");
                skipped += 1;
                continue;
            };
            let Some((identity, schema)) = schemas.get(&decoded.fqname) else {
                warn!(%key, "skipping record without a known schema");
                skipped += 1;
                continue;
            };
            if identity.kind != decoded.kind || schema.label_names.len() != decoded.label_values.len() {
                warn!(%key, "skipping record that does not match its schema");
                skipped += 1;
                continue;
            }

            let accepted = match (identity.kind, decoded.tag) {
                (MetricKind::Counter | MetricKind::Gauge, RecordTag::Value) => true,
                (MetricKind::Histogram, RecordTag::Sum) => true,
                (MetricKind::Histogram, RecordTag::Bucket(bound)) => {
                    bound.is_infinite() || schema.buckets.contains(&bound)
                }
                _ => false,
            };
            if !accepted {
                warn!(%key, "skipping record with an unexpected tag");
                skipped += 1;
                continue;
            }

            let series = families
                .entry(decoded.fqname)
                .or_default()
                .entry(decoded.label_values)
                .or_default();
            match decoded.tag {
                RecordTag::Value => series.value = Some(value),
                RecordTag::Sum => series.sum = value,
                RecordTag::Bucket(bound) => series.buckets.push((bound, value)),
            }
        }

        let collected = families
            .into_iter()
            .filter_map(|(fqname, series)| {
                let (identity, schema) = schemas.get(&fqname)?;
                let samples = build_samples(&fqname, identity.kind, schema, series);
                (!samples.is_empty()).then(|| MetricFamilySamples {
                    identity: identity.clone(),
                    schema: schema.clone(),
                    samples,
                })
            })
            .collect::<Vec<_>>();

        debug!(families = collected.len(), skipped, "metrics collected");
        Ok(collected)
    }

    /// Collect and render in the Prometheus text format.
    pub fn render(&self) -> MetricsResult<String> {
        Ok(render_prometheus(&self.collect()?))
    }

    /// Remove every value record under this registry's namespace. Local and
    /// published schemas stay in place; values start again from zero.
    pub fn wipe(&self) -> MetricsResult<u64> {
        let removed = self.store.wipe(&self.codec.scan_prefix())?;
        debug!(prefix = %self.codec.prefix(), removed, "registry storage wiped");
        Ok(removed)
    }

    /// Local schemas layered over the ones other processes published.
    fn known_schemas(&self) -> MetricsResult<BTreeMap<String, (MetricIdentity, Schema)>> {
        let mut schemas = BTreeMap::new();
        let meta_prefix = self.codec.meta_prefix();
        for (key, json) in self.store.enumerate_meta(&meta_prefix)? {
            let document: SchemaDocument = match serde_json::from_str(&json) {
                Ok(doc) => doc,
                Err(error) => {
                    warn!(%key, %error, "skipping unreadable schema document");
                    continue;
                }
            };
            let fqname = document.identity.fqname();
            let valid = key.strip_prefix(&meta_prefix) == Some(fqname.as_str())
                && document.identity.validate().is_ok()
                && document.schema.validate(document.identity.kind).is_ok();
            if !valid {
                warn!(%key, "skipping inconsistent schema document");
                continue;
            }
            schemas.insert(fqname, (document.identity, document.schema));
        }

        let metrics = self.metrics.read().unwrap_or_else(PoisonError::into_inner);
        for (fqname, binding) in metrics.iter() {
            schemas.insert(
                fqname.clone(),
                (binding.identity.clone(), binding.schema.clone()),
            );
        }
        Ok(schemas)
    }
}

/// Why `schema` cannot reuse `existing`, if it can't.
fn schema_mismatch(existing: &Binding, identity: &MetricIdentity, schema: &Schema) -> Option<String> {
    if existing.identity.kind != identity.kind {
        return Some(format!(
            "registered as a {}, requested as a {}",
            existing.identity.kind, identity.kind
        ));
    }
    if existing.identity != *identity {
        return Some(format!(
            "registered with namespace {:?} and name {:?}",
            existing.identity.namespace, existing.identity.name
        ));
    }
    if existing.schema.help != schema.help {
        return Some("help text differs".to_string());
    }
    if existing.schema.label_names != schema.label_names {
        return Some(format!(
            "label names differ: registered {:?}, requested {:?}",
            existing.schema.label_names, schema.label_names
        ));
    }
    if existing.schema.buckets != schema.buckets {
        return Some(format!(
            "bucket bounds differ: registered {:?}, requested {:?}",
            existing.schema.buckets, schema.buckets
        ));
    }
    None
}

fn build_samples(
    fqname: &str,
    kind: MetricKind,
    schema: &Schema,
    series: BTreeMap<Vec<String>, Series>,
) -> Vec<Sample> {
    let mut samples = Vec::new();
    for (label_values, s) in series {
        match kind {
            MetricKind::Counter | MetricKind::Gauge => {
                if let Some(value) = s.value {
                    samples.push(Sample {
                        name: fqname.to_string(),
                        label_values,
                        le: None,
                        value,
                    });
                }
            }
            MetricKind::Histogram => {
                let count_at = |bound: f64| {
                    s.buckets
                        .iter()
                        .find(|(b, _)| *b == bound)
                        .map(|(_, v)| *v)
                        .unwrap_or(0.0)
                };
                let bucket_name = format!("{fqname}_bucket");
                for bound in schema.buckets.iter().copied().chain(std::iter::once(f64::INFINITY)) {
                    samples.push(Sample {
                        name: bucket_name.clone(),
                        label_values: label_values.clone(),
                        le: Some(format_value(bound)),
                        value: count_at(bound),
                    });
                }
                samples.push(Sample {
                    name: format!("{fqname}_sum"),
                    label_values: label_values.clone(),
                    le: None,
                    value: s.sum,
                });
                samples.push(Sample {
                    name: format!("{fqname}_count"),
                    label_values,
                    le: None,
                    value: count_at(f64::INFINITY),
                });
            }
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_registry;
    use promshare_store::{MemoryStore, StoreError, StoreResult};
    use std::thread;

    /// Adapter whose value operations always fail with a fixed error.
    struct FailingStore {
        contention: bool,
    }

    impl FailingStore {
        fn error(&self, key: &str) -> StoreError {
            if self.contention {
                StoreError::Contention {
                    key: key.to_string(),
                    attempts: 3,
                }
            } else {
                StoreError::Unavailable(format!("backend down while writing {key}"))
            }
        }
    }

    impl StorageAdapter for FailingStore {
        fn add_and_get(&self, key: &str, _delta: f64) -> StoreResult<f64> {
            Err(self.error(key))
        }

        fn set_and_get(&self, key: &str, _value: f64) -> StoreResult<f64> {
            Err(self.error(key))
        }

        fn enumerate(&self, prefix: &str) -> StoreResult<Vec<(String, f64)>> {
            Err(self.error(prefix))
        }

        fn put_meta(&self, key: &str, _document: &str) -> StoreResult<()> {
            Err(self.error(key))
        }

        fn enumerate_meta(&self, prefix: &str) -> StoreResult<Vec<(String, String)>> {
            Err(self.error(prefix))
        }

        fn wipe(&self, prefix: &str) -> StoreResult<u64> {
            Err(self.error(prefix))
        }
    }

    #[test]
    fn get_or_register_returns_same_family() {
        let registry = memory_registry();
        let a = registry
            .get_or_register_counter("cache", "hits_total", "Cache hits.", &["cache_type"])
            .unwrap();
        let b = registry
            .get_or_register_counter("cache", "hits_total", "Cache hits.", &["cache_type"])
            .unwrap();
        assert_eq!(a.identity(), b.identity());

        a.inc(&["redis"]).unwrap();
        b.inc(&["redis"]).unwrap();
        b.inc(&["apcu"]).unwrap();

        let families = registry.collect().unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].fqname(), "cache_hits_total");
        assert_eq!(families[0].samples.len(), 2);
        assert_eq!(families[0].samples[1].label_values, ["redis"]);
        assert_eq!(families[0].samples[1].value, 2.0);
    }

    #[test]
    fn schema_changes_are_duplicates() {
        let registry = memory_registry();
        registry
            .get_or_register_counter("app", "requests_total", "Requests.", &["method"])
            .unwrap();

        let attempts = [
            registry
                .get_or_register_counter("app", "requests_total", "Requests.", &["verb"])
                .map(|_| ()),
            registry
                .get_or_register_counter("app", "requests_total", "Other help.", &["method"])
                .map(|_| ()),
            registry
                .get_or_register_gauge("app", "requests_total", "Requests.", &["method"])
                .map(|_| ()),
            registry
                .get_or_register_histogram("app", "requests_total", "Requests.", &["method"], None)
                .map(|_| ()),
            registry
                .get_or_register_counter("app_requests", "total", "Requests.", &["method"])
                .map(|_| ()),
        ];
        for result in attempts {
            assert!(
                matches!(result, Err(MetricsError::DuplicateMetric { .. })),
                "expected DuplicateMetric, got {:?}",
                result.err()
            );
        }
    }

    #[test]
    fn histogram_bucket_change_is_duplicate() {
        let registry = memory_registry();
        registry
            .get_or_register_histogram("", "latency", "L.", &[], Some(vec![1.0, 2.0]))
            .unwrap();
        assert!(registry
            .get_or_register_histogram("", "latency", "L.", &[], Some(vec![1.0, 2.0]))
            .is_ok());
        assert!(matches!(
            registry.get_or_register_histogram("", "latency", "L.", &[], Some(vec![1.0, 3.0])),
            Err(MetricsError::DuplicateMetric { .. })
        ));
    }

    #[test]
    fn plain_register_is_not_idempotent() {
        let registry = memory_registry();
        registry.register_gauge("app", "up", "Up.", &[]).unwrap();
        assert!(matches!(
            registry.register_gauge("app", "up", "Up.", &[]),
            Err(MetricsError::DuplicateMetric { .. })
        ));
        assert!(registry.get_or_register_gauge("app", "up", "Up.", &[]).is_ok());
    }

    #[test]
    fn failed_registration_leaves_no_trace() {
        let registry = memory_registry();
        assert!(matches!(
            registry.register_counter("app", "x_total", "X.", &["le"]),
            Err(MetricsError::InvalidLabel(_))
        ));
        assert!(matches!(
            registry.register_histogram("app", "y", "Y.", &[], Some(vec![2.0, 1.0])),
            Err(MetricsError::InvalidBuckets(_))
        ));
        assert!(matches!(
            registry.register_counter("app", "bad name", "X.", &[]),
            Err(MetricsError::InvalidName(_))
        ));

        // The names are still free.
        assert!(registry.register_counter("app", "x_total", "X.", &["method"]).is_ok());
        assert!(registry.register_histogram("app", "y", "Y.", &[], Some(vec![1.0])).is_ok());
        assert!(matches!(
            registry.get_counter("app", "bad name"),
            Err(MetricsError::MetricNotFound(_))
        ));
    }

    #[test]
    fn lookup_by_kind() {
        let registry = memory_registry();
        registry.register_gauge("app", "active", "Active.", &[]).unwrap();

        assert!(registry.get_gauge("app", "active").is_ok());
        assert!(matches!(
            registry.get_counter("app", "active"),
            Err(MetricsError::MetricNotFound(_))
        ));
        assert!(matches!(
            registry.get_histogram("app", "missing"),
            Err(MetricsError::MetricNotFound(_))
        ));
    }

    #[test]
    fn kind_generic_register() {
        let registry = memory_registry();
        let metric = registry
            .register(MetricKind::Histogram, "app", "size_bytes", "Size.", &[], None)
            .unwrap();
        let Metric::Histogram(histogram) = metric else {
            panic!("expected a histogram handle");
        };
        assert_eq!(histogram.buckets(), &crate::buckets::DEFAULT_BUCKETS);

        let again = registry
            .get_or_register(MetricKind::Histogram, "app", "size_bytes", "Size.", &[], None)
            .unwrap();
        assert_eq!(again.identity().fqname(), "app_size_bytes");
    }

    #[test]
    fn collect_orders_families_and_series() {
        let registry = memory_registry();
        let zeta = registry.register_counter("", "zeta_total", "Z.", &["k"]).unwrap();
        let alpha = registry.register_gauge("", "alpha", "A.", &["k", "j"]).unwrap();

        zeta.inc(&["b"]).unwrap();
        zeta.inc(&["a"]).unwrap();
        alpha.set(1.0, &["x", "2"]).unwrap();
        alpha.set(2.0, &["x", "10"]).unwrap();
        alpha.set(3.0, &["w", "9"]).unwrap();

        let families = registry.collect().unwrap();
        let names: Vec<String> = families.iter().map(|f| f.fqname()).collect();
        assert_eq!(names, ["alpha", "zeta_total"]);

        let alpha_values: Vec<&[String]> = families[0]
            .samples
            .iter()
            .map(|s| s.label_values.as_slice())
            .collect();
        assert_eq!(alpha_values, [&["w", "9"][..], &["x", "10"][..], &["x", "2"][..]]);
        assert_eq!(families[1].samples[0].label_values, ["a"]);
    }

    #[test]
    fn histogram_series_ordered_by_labels_then_bound() {
        let registry = memory_registry();
        let histogram = registry
            .register_histogram("", "d", "D.", &["m"], Some(vec![1.0]))
            .unwrap();
        histogram.observe(0.5, &["POST"]).unwrap();
        histogram.observe(2.0, &["GET"]).unwrap();

        let families = registry.collect().unwrap();
        let lines: Vec<String> = families[0]
            .samples
            .iter()
            .map(|s| format!("{} {:?} {:?}", s.name, s.label_values, s.le))
            .collect();
        assert_eq!(
            lines,
            [
                r#"d_bucket ["GET"] Some("1")"#,
                r#"d_bucket ["GET"] Some("+Inf")"#,
                r#"d_sum ["GET"] None"#,
                r#"d_count ["GET"] None"#,
                r#"d_bucket ["POST"] Some("1")"#,
                r#"d_bucket ["POST"] Some("+Inf")"#,
                r#"d_sum ["POST"] None"#,
                r#"d_count ["POST"] None"#,
            ]
        );
    }

    #[test]
    fn render_single_counter() {
        let registry = memory_registry();
        let counter = registry
            .register_counter("app", "requests_total", "Total requests", &["method", "endpoint"])
            .unwrap();
        counter.inc_by(2.0, &["GET", "/api/users"]).unwrap();

        assert_eq!(
            registry.render().unwrap(),
            "# HELP app_requests_total Total requests\n\
             # TYPE app_requests_total counter\n\
             app_requests_total{method=\"GET\",endpoint=\"/api/users\"} 2\n"
        );
    }

    #[test]
    fn wipe_clears_values_but_keeps_schemas() {
        let registry = memory_registry();
        let counter = registry.register_counter("app", "c_total", "C.", &["x"]).unwrap();
        let histogram = registry
            .register_histogram("app", "h", "H.", &["x"], Some(vec![1.0]))
            .unwrap();
        counter.inc(&["a"]).unwrap();
        histogram.observe(0.5, &["a"]).unwrap();

        assert!(registry.wipe().unwrap() > 0);
        assert!(registry.collect().unwrap().iter().all(|f| f.samples.is_empty()));
        assert!(registry.collect().unwrap().is_empty());

        // Still registered, counting from zero again.
        assert_eq!(counter.inc(&["a"]).unwrap(), 1.0);
        assert!(registry.get_histogram("app", "h").is_ok());
    }

    #[test]
    fn wipe_leaves_other_namespaces_alone() {
        let store: Arc<dyn StorageAdapter> = Arc::new(MemoryStore::new());
        let ours = CollectorRegistry::with_prefix(store.clone(), "ours").unwrap();
        let theirs = CollectorRegistry::with_prefix(store.clone(), "theirs").unwrap();

        ours.register_counter("", "a_total", "A.", &[]).unwrap().inc::<&str>(&[]).unwrap();
        theirs.register_counter("", "a_total", "A.", &[]).unwrap().inc::<&str>(&[]).unwrap();

        ours.wipe().unwrap();
        assert!(ours.collect().unwrap().is_empty());
        assert_eq!(theirs.collect().unwrap()[0].samples[0].value, 1.0);
    }

    #[test]
    fn collects_families_registered_elsewhere() {
        let store: Arc<dyn StorageAdapter> = Arc::new(MemoryStore::new());
        let worker = CollectorRegistry::new(store.clone());
        let scraper = CollectorRegistry::new(store.clone());

        worker
            .register_counter("shared", "process_requests", "Requests by process.", &["pid"])
            .unwrap()
            .inc(&["4242"])
            .unwrap();

        let families = scraper.collect().unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].schema.help, "Requests by process.");
        assert_eq!(families[0].samples[0].label_values, ["4242"]);
    }

    #[test]
    fn malformed_records_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let registry = CollectorRegistry::new(store.clone());
        let counter = registry.register_counter("", "ok_total", "OK.", &["a"]).unwrap();
        counter.inc(&["x"]).unwrap();

        store.set_and_get("promshare:counter:ok_total:nothex:value", 1.0).unwrap();
        store.set_and_get("promshare:counter:unknown_total:5b5d:value", 1.0).unwrap();
        store.set_and_get("promshare:gauge:ok_total:5b2278225d:value", 1.0).unwrap();
        store.set_and_get("promshare:counter:ok_total:5b5d:value", 1.0).unwrap();
        store.put_meta("promshare:meta:broken", "{not json").unwrap();

        let families = registry.collect().unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].samples.len(), 1);
        assert_eq!(families[0].samples[0].value, 1.0);
    }

    #[test]
    fn concurrent_writers_do_not_lose_increments() {
        let registry = memory_registry();
        let counter = registry
            .register_counter("", "work_total", "Work.", &["queue"])
            .unwrap();

        const WRITERS: usize = 8;
        const N: usize = 500;
        thread::scope(|s| {
            for _ in 0..WRITERS {
                let counter = counter.clone();
                s.spawn(move || {
                    for _ in 0..N {
                        counter.inc_by(1.0, &["default"]).unwrap();
                    }
                });
            }
        });

        let families = registry.collect().unwrap();
        assert_eq!(families[0].samples[0].value, (WRITERS * N) as f64);
    }

    #[test]
    fn wipe_ignores_namespaces_sharing_a_leading_segment() {
        let store: Arc<dyn StorageAdapter> = Arc::new(MemoryStore::new());
        let app = CollectorRegistry::with_prefix(store.clone(), "app").unwrap();
        let edge = CollectorRegistry::with_prefix(store.clone(), "app-edge").unwrap();
        edge.register_counter("", "x_total", "X.", &[]).unwrap().inc::<&str>(&[]).unwrap();

        app.wipe().unwrap();
        assert!(app.collect().unwrap().is_empty());
        assert_eq!(edge.collect().unwrap()[0].samples[0].value, 1.0);

        assert!(matches!(
            CollectorRegistry::with_prefix(store.clone(), "app:edge"),
            Err(MetricsError::InvalidArgument(_))
        ));
        assert!(CollectorRegistry::with_prefix(store, "").is_err());
    }

    #[test]
    fn published_schemas_survive_wipe() {
        let store: Arc<dyn StorageAdapter> = Arc::new(MemoryStore::new());
        let worker = CollectorRegistry::new(store.clone());
        let scraper = CollectorRegistry::new(store.clone());

        let jobs = worker.register_counter("w", "jobs_total", "Jobs.", &[]).unwrap();
        jobs.inc::<&str>(&[]).unwrap();
        worker.wipe().unwrap();
        assert!(scraper.collect().unwrap().is_empty());

        jobs.inc::<&str>(&[]).unwrap();
        let families = scraper.collect().unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].identity.fqname(), "w_jobs_total");
        assert_eq!(families[0].samples[0].value, 1.0);
    }

    #[test]
    fn backend_failures_reach_the_caller() {
        let unavailable = CollectorRegistry::new(Arc::new(FailingStore { contention: false }));
        let contended = CollectorRegistry::new(Arc::new(FailingStore { contention: true }));

        for (registry, expect_contention) in [(&unavailable, false), (&contended, true)] {
            // Registration succeeds even though publishing the schema fails.
            let counter = registry.register_counter("", "c_total", "C.", &[]).unwrap();
            let gauge = registry.register_gauge("", "g", "G.", &[]).unwrap();
            let histogram = registry
                .register_histogram("", "h", "H.", &[], Some(vec![1.0]))
                .unwrap();

            let errors = [
                counter.inc_by::<&str>(1.0, &[]).unwrap_err(),
                gauge.set::<&str>(2.0, &[]).unwrap_err(),
                histogram.observe::<&str>(0.5, &[]).unwrap_err(),
                registry.collect().unwrap_err(),
                registry.wipe().unwrap_err(),
            ];
            for error in errors {
                assert!(matches!(error, MetricsError::Storage(_)), "{error}");
                assert_eq!(error.is_storage_contention(), expect_contention, "{error}");
                assert_eq!(error.is_storage_unavailable(), !expect_contention, "{error}");
            }
        }
    }

    #[test]
    fn published_schema_is_visible_to_other_registries() {
        let store: Arc<dyn StorageAdapter> = Arc::new(MemoryStore::new());
        let worker = CollectorRegistry::new(store.clone());
        let other = CollectorRegistry::new(store);

        assert!(other.published_schema("app", "lat").unwrap().is_none());
        worker
            .register_histogram("app", "lat", "Latency.", &["method"], Some(vec![0.5, 1.0]))
            .unwrap();

        let (identity, schema) = other.published_schema("app", "lat").unwrap().unwrap();
        assert_eq!(identity.kind, MetricKind::Histogram);
        assert_eq!(schema.help, "Latency.");
        assert_eq!(schema.label_names, ["method"]);
        assert_eq!(schema.buckets, [0.5, 1.0]);
    }
}
