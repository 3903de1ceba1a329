use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quarry_core::{Installation, UpdateSetCalculator};
use quarry_resolve::{DirectRepository, LocalRepository, QuarryConfig};
use quarry_schema::{ArtifactCoordinate, CurationPolicies, Manifest, MavenVersion};
use quarry_store::diff_manifests;
use std::sync::Arc;

fn version_strings(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| match i % 4 {
            0 => format!("{}.{}.{}", i % 7, i % 13, i),
            1 => format!("{}.{}-rc{}", i % 7, i % 13, i % 5),
            2 => format!("{}.{}.{}.Final", i % 7, i % 13, i % 11),
            _ => format!("{}.{}-SNAPSHOT", i % 7, i % 13),
        })
        .collect()
}

fn manifest_with(n: usize, bump_every: usize) -> Manifest {
    Manifest::from_streams(
        "bench",
        (0..n).map(|i| {
            let version = if bump_every > 0 && i % bump_every == 0 {
                "1.1"
            } else {
                "1.0"
            };
            ArtifactCoordinate::jar("org.bench", &format!("artifact-{i:04}"), version)
        }),
    )
    .unwrap()
}

fn bench_version_sort(c: &mut Criterion) {
    let raw = version_strings(1000);
    c.bench_function("maven_version_sort_1000", |b| {
        b.iter(|| {
            let mut versions: Vec<MavenVersion> =
                raw.iter().map(|v| MavenVersion::new(v.as_str())).collect();
            versions.sort();
            black_box(versions);
        });
    });
}

fn bench_manifest_diff(c: &mut Criterion) {
    let old = manifest_with(2000, 0);
    let new = manifest_with(2000, 10);
    c.bench_function("manifest_diff_2000_streams", |b| {
        b.iter(|| black_box(diff_manifests(&old, &new)));
    });
}

fn bench_manifest_parse(c: &mut Criterion) {
    let text = manifest_with(2000, 0).to_text();
    c.bench_function("manifest_parse_2000_streams", |b| {
        b.iter(|| black_box(Manifest::parse_str(&text).unwrap()));
    });
}

fn bench_update_set(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalRepository::new("local", dir.path().join("repo"));
    for i in 0..100 {
        for v in ["1.0", "1.1", "1.2"] {
            local
                .deploy(
                    &ArtifactCoordinate::jar("org.bench", &format!("artifact-{i:04}"), v),
                    b"x",
                )
                .unwrap();
        }
    }
    let repo = DirectRepository::new(Box::new(local), Arc::new(CurationPolicies::new()));
    let policies = CurationPolicies::new();
    let installed = manifest_with(100, 0);
    c.bench_function("update_set_100_local", |b| {
        b.iter(|| {
            let set = UpdateSetCalculator::new(&repo, &policies)
                .calculate(&installed)
                .unwrap();
            black_box(set);
        });
    });
}

fn bench_history(c: &mut Criterion) {
    c.bench_function("install_then_history_10_streams", |b| {
        b.iter_with_setup(
            || {
                let dir = tempfile::tempdir().unwrap();
                let repo_root = dir.path().join("repo");
                let local = LocalRepository::new("local", &repo_root);
                for i in 0..10 {
                    local
                        .deploy(
                            &ArtifactCoordinate::jar("org.bench", &format!("artifact-{i:04}"), "1.0"),
                            b"x",
                        )
                        .unwrap();
                }
                let config: QuarryConfig = toml_config(repo_root.to_str().unwrap());
                let inst = Installation::open(dir.path().join("server"), config).unwrap();
                (dir, inst)
            },
            |(_dir, inst)| {
                inst.install(&manifest_with(10, 0)).unwrap();
                black_box(inst.history().unwrap());
            },
        );
    });
}

fn toml_config(repo: &str) -> QuarryConfig {
    QuarryConfig::from_toml_str(&format!(
        "[[channels]]\nname = \"bench\"\nmanifest = \"org.bench:channel\"\n\
         [[channels.repositories]]\nid = \"local\"\nurl = \"{repo}\"\n"
    ))
    .unwrap()
}

criterion_group!(
    benches,
    bench_version_sort,
    bench_manifest_diff,
    bench_manifest_parse,
    bench_update_set,
    bench_history
);
criterion_main!(benches);
