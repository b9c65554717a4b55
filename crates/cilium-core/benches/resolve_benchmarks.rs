use cilium_policy::{
    policies_covering, resolve, DockerConfig, FoldMode, Intent, IntentConfig, Policy, PolicySource,
};
use cilium_schema::{Coverage, HostConfig, Labels, User};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn sources(users: usize, per_user: usize) -> (Vec<User>, Vec<PolicySource>) {
    let mut all_users = Vec::with_capacity(users);
    let mut all_sources = Vec::with_capacity(users);
    for u in 0..users {
        let owner = format!("user{u}");
        all_users.push(User::new(u as u32, owner.clone()));
        let policies = (0..per_user)
            .map(|p| Policy {
                name: format!("p{p}"),
                owner: owner.clone(),
                coverage: Coverage::new(labels(&[("app", "web.*"), ("tier", "front")])),
                priority: (p % 7) as i32,
                docker_config: DockerConfig {
                    host_config: Some(HostConfig {
                        dns: Some(vec![format!("10.0.{u}.{p}")]),
                        ..HostConfig::default()
                    }),
                    ..DockerConfig::default()
                },
                intent_config: IntentConfig {
                    config: Intent {
                        max_scale: Some(p as u32 + 1),
                        ..Intent::default()
                    },
                    priority: (p % 3) as i32,
                },
                ..Policy::default()
            })
            .collect();
        all_sources.push(PolicySource { owner, policies });
    }
    (all_users, all_sources)
}

fn bench_covering(c: &mut Criterion) {
    let (_, sources) = sources(10, 50);
    let target = labels(&[("app", "web-frontend"), ("tier", "front")]);
    c.bench_function("policies_covering_500", |b| {
        b.iter(|| policies_covering(black_box(&sources), black_box(&target)));
    });
}

fn bench_resolve_docker(c: &mut Criterion) {
    let (users, sources) = sources(10, 50);
    c.bench_function("resolve_docker_500", |b| {
        b.iter(|| {
            resolve::<DockerConfig>(black_box(&users), black_box(&sources), FoldMode::Overwrite)
                .unwrap()
        });
    });
}

fn bench_resolve_intent(c: &mut Criterion) {
    let (users, sources) = sources(10, 50);
    for mode in [FoldMode::Overwrite, FoldMode::Additive] {
        c.bench_function(&format!("resolve_intent_500_{mode}"), |b| {
            b.iter(|| resolve::<IntentConfig>(black_box(&users), black_box(&sources), mode).unwrap());
        });
    }
}

criterion_group!(benches, bench_covering, bench_resolve_docker, bench_resolve_intent);
criterion_main!(benches);
