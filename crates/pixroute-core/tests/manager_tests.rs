//! End-to-end behaviour of the image manager
//!
//! Run with: cargo test --package pixroute-core --test manager_tests

use pixroute_cache::{Clock, ManualClock};
use pixroute_core::logging::init_test_tracing;
use pixroute_core::prelude::*;
use pixroute_core::ConfigError;
use pixroute_flavor::LoadError;
use pixroute_test_utils::{
    flavor, trail_of, FakeConverter, FakeLoaderFactory, FakePreloader, LoadBehavior,
};
use pretty_assertions::assert_eq;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    manager: ImageManager,
    png: FakeLoaderFactory,
    probe: FakePreloader,
    rgba: Flavor,
    gray: Flavor,
}

fn fixture(prefix: &str, config: PixrouteConfig, clock: Option<Arc<ManualClock>>) -> Fixture {
    let _ = init_test_tracing();
    let rgba = flavor(&format!("{prefix}.rgba"));
    let gray = flavor(&format!("{prefix}.gray"));
    let png = FakeLoaderFactory::new("png", "image/png").producing(&rgba, 2);
    let probe = FakePreloader::new("probe", 0).knowing("/assets/a.png", "image/png");

    let registry = Arc::new(CapabilityRegistry::new());
    registry.register_loader_factory(png.clone().into_arc());
    registry.register_converter(FakeConverter::new("rgba2gray", &rgba, &gray, 3).into_arc());
    registry.register_preloader(probe.clone().into_arc());

    let mut builder = ImageManager::builder()
        .with_registry(registry)
        .with_config(config.with_plugin_discovery(false));
    if let Some(clock) = clock {
        builder = builder.with_clock(clock as Arc<dyn Clock>);
    }

    Fixture {
        manager: builder.build().unwrap(),
        png,
        probe,
        rgba,
        gray,
    }
}

fn session() -> SessionContext {
    SessionContext::new().with_base("/assets")
}

#[test]
fn load_resolves_and_converts() {
    let fx = fixture("manager-tests.load", PixrouteConfig::new(), None);

    let artifact = fx
        .manager
        .load("a.png", &[fx.gray.clone()], &LoadHints::new(), &session())
        .unwrap();

    assert_eq!(artifact.flavor(), &fx.gray);
    assert_eq!(trail_of(&artifact), vec!["png:load", "rgba2gray"]);
}

#[test]
fn second_load_hits_artifact_cache() {
    let fx = fixture("manager-tests.cached", PixrouteConfig::new(), None);
    let targets = [fx.gray.clone()];

    let first = fx.manager.load("a.png", &targets, &LoadHints::new(), &session()).unwrap();
    let second = fx.manager.load("a.png", &targets, &LoadHints::new(), &session()).unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(fx.png.loads(), 1);
    assert_eq!(fx.probe.calls(), 1);

    fx.manager.clear_caches();
    let third = fx.manager.load("a.png", &targets, &LoadHints::new(), &session()).unwrap();
    assert!(!third.ptr_eq(&first));
    assert_eq!(fx.png.loads(), 2);
}

#[test]
fn missing_source_is_negatively_cached_then_retried() {
    let clock = Arc::new(ManualClock::new());
    let config = PixrouteConfig::new().with_invalid_source_expiration(Duration::from_secs(2));
    let fx = fixture("manager-tests.missing", config, Some(Arc::clone(&clock)));
    let targets = [fx.rgba.clone()];

    let err = fx.manager.load("late.png", &targets, &LoadHints::new(), &session()).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(fx.probe.calls(), 1);

    fx.probe.add_source("/assets/late.png", "image/png");

    clock.advance(Duration::from_secs(1));
    let err = fx.manager.load("late.png", &targets, &LoadHints::new(), &session()).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(fx.probe.calls(), 1);

    clock.advance(Duration::from_secs(2));
    let artifact = fx.manager.load("late.png", &targets, &LoadHints::new(), &session()).unwrap();
    assert_eq!(artifact.flavor(), &fx.rgba);
    assert_eq!(fx.probe.calls(), 2);
}

#[test]
fn concurrent_loads_share_one_cached_artifact() {
    let fx = fixture("manager-tests.parallel", PixrouteConfig::new(), None);
    let manager = &fx.manager;
    let targets = [fx.gray.clone()];

    let loaded: Vec<Artifact> = (0..32)
        .into_par_iter()
        .map(|_| manager.load("a.png", &targets, &LoadHints::new(), &session()).unwrap())
        .collect();
    assert!(loaded.iter().all(|a| a.flavor() == &fx.gray));

    let cached = manager.load("a.png", &targets, &LoadHints::new(), &session()).unwrap();
    assert!(loaded.iter().any(|a| a.ptr_eq(&cached)));
    assert!(fx.png.loads() >= 1);
}

/// Describes any `.png` using the id exactly as the caller passed it
struct RelativePreloader;

impl Preloader for RelativePreloader {
    fn implementation_id(&self) -> &str {
        "relative"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn preload(
        &self,
        source_id: &str,
        _session: &SessionContext,
    ) -> Result<Option<ImageDescriptor>, LoadError> {
        Ok(source_id
            .ends_with(".png")
            .then(|| ImageDescriptor::new(source_id, "image/png")))
    }
}

#[test]
fn same_relative_id_under_two_bases_is_cached_separately() {
    let _ = init_test_tracing();
    let rgba = flavor("manager-tests.bases.rgba");
    let png = FakeLoaderFactory::new("png", "image/png").producing(&rgba, 1);
    let registry = Arc::new(CapabilityRegistry::new());
    registry.register_loader_factory(png.clone().into_arc());
    registry.register_preloader(Arc::new(RelativePreloader));
    let manager = ImageManager::builder()
        .with_registry(registry)
        .with_config(PixrouteConfig::new().with_plugin_discovery(false))
        .build()
        .unwrap();

    let targets = [rgba.clone()];
    let under_a = SessionContext::new().with_base("/a");
    let under_b = SessionContext::new().with_base("/b");

    let a = manager.load("x.png", &targets, &LoadHints::new(), &under_a).unwrap();
    let b = manager.load("x.png", &targets, &LoadHints::new(), &under_b).unwrap();
    assert!(!a.ptr_eq(&b));
    assert_eq!(png.loads(), 2);

    let a_again = manager.load("x.png", &targets, &LoadHints::new(), &under_a).unwrap();
    assert!(a_again.ptr_eq(&a));
    assert_eq!(png.loads(), 2);

    let descriptor_a = manager.descriptor("x.png", &under_a).unwrap();
    let descriptor_b = manager.descriptor("x.png", &under_b).unwrap();
    assert_ne!(descriptor_a.id(), descriptor_b.id());
}

#[test]
fn unsupported_conversion_is_not_cached() {
    let fx = fixture("manager-tests.unsupported", PixrouteConfig::new(), None);
    let thumb = flavor("manager-tests.unsupported.thumb");

    let err = fx
        .manager
        .load("a.png", &[thumb.clone()], &LoadHints::new(), &session())
        .unwrap_err();
    assert!(err.is_unsupported());

    fx.manager
        .registry()
        .register_converter(FakeConverter::new("gray2thumb", &fx.gray, &thumb, 1).into_arc());

    let artifact = fx
        .manager
        .load("a.png", &[thumb.clone()], &LoadHints::new(), &session())
        .unwrap();
    assert_eq!(trail_of(&artifact), vec!["png:load", "rgba2gray", "gray2thumb"]);
}

#[test]
fn decode_failure_propagates_without_negative_caching() {
    let fx = fixture("manager-tests.decode", PixrouteConfig::new(), None);
    let broken = flavor("manager-tests.decode.broken");
    fx.manager.registry().register_loader_factory(
        FakeLoaderFactory::new("bmp", "image/bmp")
            .producing(&broken, 1)
            .behaving(LoadBehavior::Malformed)
            .into_arc(),
    );
    fx.probe.add_source("/assets/bad.bmp", "image/bmp");

    let err = fx
        .manager
        .load("bad.bmp", &[broken], &LoadHints::new(), &session())
        .unwrap_err();

    assert!(matches!(err, ImageError::Pipeline(_)));
    assert!(!fx.manager.cache().is_invalid("/assets/bad.bmp"));
}

#[test]
fn loader_not_found_marks_source_invalid() {
    let fx = fixture("manager-tests.vanished", PixrouteConfig::new(), None);
    let raw = flavor("manager-tests.vanished.raw");
    fx.manager.registry().register_loader_factory(
        FakeLoaderFactory::new("tiff", "image/tiff")
            .producing(&raw, 1)
            .behaving(LoadBehavior::NotFound)
            .into_arc(),
    );
    fx.probe.add_source("/assets/gone.tiff", "image/tiff");

    let err = fx
        .manager
        .load("gone.tiff", &[raw], &LoadHints::new(), &session())
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(fx.manager.cache().is_invalid("/assets/gone.tiff"));
    assert!(fx.manager.cache().peek_descriptor("/assets/gone.tiff").is_none());
}

#[test]
fn config_overrides_steer_loader_choice() {
    let prefix = "manager-tests.steer";
    let config = PixrouteConfig::new().with_penalty_override("png", Penalty::new(100));
    let fx = fixture(prefix, config, None);
    fx.manager.registry().register_loader_factory(
        FakeLoaderFactory::new("png-alt", "image/png")
            .producing(&fx.rgba, 10)
            .into_arc(),
    );

    let pipeline = fx
        .manager
        .pipeline_for("a.png", &[fx.gray.clone()], &session())
        .unwrap();
    assert_eq!(pipeline.describe(), "png-alt:load -> rgba2gray");
    assert_eq!(pipeline.penalty(), Penalty::new(13));
}

#[test]
fn convert_in_memory_artifact() {
    let fx = fixture("manager-tests.convert", PixrouteConfig::new(), None);
    let input = Artifact::new(fx.rgba.clone(), pixroute_test_utils::Trail(Vec::new()));

    let out = fx
        .manager
        .convert(&input, &[fx.gray.clone()], &LoadHints::new(), &SessionContext::new())
        .unwrap();
    assert_eq!(trail_of(&out), vec!["rgba2gray"]);

    let nowhere = flavor("manager-tests.convert.nowhere");
    let err = fx
        .manager
        .convert(&input, &[nowhere], &LoadHints::new(), &SessionContext::new())
        .unwrap_err();
    assert!(err.is_unsupported());
}

#[test]
fn explicit_providers_register_at_build() {
    struct Thumbnails;

    impl CapabilityProvider for Thumbnails {
        fn name(&self) -> &str {
            "thumbnails"
        }

        fn register(&self, registry: &CapabilityRegistry) {
            let gray = flavor("manager-tests.provider.gray");
            let thumb = flavor("manager-tests.provider.thumb");
            registry.register_converter(FakeConverter::new("thumbnail", &gray, &thumb, 1).into_arc());
        }
    }

    let manager = ImageManager::builder()
        .with_config(PixrouteConfig::new().with_plugin_discovery(false))
        .with_provider(Arc::new(Thumbnails))
        .build()
        .unwrap();

    assert_eq!(manager.registry().converter_generation(), 1);
    assert!(!manager.registry().is_discovered());
}

#[test]
fn invalid_config_fails_build() {
    let err = ImageManager::builder()
        .with_config(PixrouteConfig::new().with_max_artifacts(0))
        .build()
        .unwrap_err();
    assert!(matches!(err, ImageError::Config(ConfigError::Invalid(_))));
}

#[test]
fn housekeeper_started_from_config() {
    let manager = ImageManager::builder()
        .with_config(
            PixrouteConfig::new()
                .with_plugin_discovery(false)
                .with_housekeeping_interval(Duration::from_millis(10)),
        )
        .build()
        .unwrap();
    assert!(manager.has_housekeeper());
    assert_eq!(manager.housekeeping(), 0);
}
