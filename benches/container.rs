#![allow(dead_code)]

use beanstalk::{BeanDefinition, BeanDefinitionBuilder, BeanFactory, Container, DefaultScope, DependencyDescriptor};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

struct A(Arc<B>, Arc<C>);
struct B(i32);
struct C(Arc<CA>);
struct CA(Arc<CAA>);
struct CAA(Arc<CAAA>);
struct CAAA;

fn finish<T: Send + Sync + 'static>(
    builder: BeanDefinitionBuilder<T>,
    scope: DefaultScope,
    with_destroy: bool,
) -> BeanDefinition {
    let builder = builder.scope(scope);
    if with_destroy {
        builder.pre_destroy("release", |_| Ok(())).build()
    } else {
        builder.build()
    }
}

fn definitions(scope: DefaultScope, with_destroy: bool) -> Vec<BeanDefinition> {
    vec![
        finish(BeanDefinition::builder("caaa", |_| Ok(CAAA)), scope, with_destroy),
        finish(
            BeanDefinition::builder("caa", |deps| Ok(CAA(deps.require("caaa")?)))
                .constructor_dependency(DependencyDescriptor::of_type::<CAAA>("caaa")),
            scope,
            with_destroy,
        ),
        finish(
            BeanDefinition::builder("ca", |deps| Ok(CA(deps.require("caa")?)))
                .constructor_dependency(DependencyDescriptor::of_type::<CAA>("caa")),
            scope,
            with_destroy,
        ),
        finish(
            BeanDefinition::builder("c", |deps| Ok(C(deps.require("ca")?)))
                .constructor_dependency(DependencyDescriptor::of_type::<CA>("ca")),
            scope,
            with_destroy,
        ),
        finish(BeanDefinition::builder("b", |_| Ok(B(2))), scope, with_destroy),
        finish(
            BeanDefinition::builder("a", |deps| Ok(A(deps.require("b")?, deps.require("c")?)))
                .constructor_dependency(DependencyDescriptor::of_type::<B>("b"))
                .constructor_dependency(DependencyDescriptor::qualified::<C>("c", "c")),
            scope,
            with_destroy,
        ),
    ]
}

fn factory(scope: DefaultScope, with_destroy: bool) -> BeanFactory {
    let factory = BeanFactory::default();
    factory.register_definitions(definitions(scope, with_destroy)).unwrap();
    factory
}

fn long_chain(len: usize) -> BeanFactory {
    let factory = BeanFactory::default();
    for index in 0..len {
        let mut definition = BeanDefinition::builder(format!("bean{index}"), |_| Ok(()));
        if index + 1 < len {
            let next = format!("bean{}", index + 1);
            definition = definition.constructor_dependency(DependencyDescriptor::qualified::<()>(next.clone(), next));
        }
        factory.register_definition(definition).unwrap();
    }
    factory
}

#[inline]
fn container_close(with_destroy: bool) {
    let container = Container::with_factory(factory(DefaultScope::Singleton, with_destroy));
    container.refresh().unwrap();
    let _ = container.get_as::<A>("a").unwrap();

    container.close();
}

fn criterion_benchmark(c: &mut Criterion) {
    let prototype_factory = factory(DefaultScope::Prototype, false);
    let singleton_factory = factory(DefaultScope::Singleton, false);
    let chain_factory = long_chain(1_000);

    c.bench_function("factory_register_definitions", |b| {
        b.iter(|| factory(DefaultScope::Singleton, true))
    })
    .bench_function("factory_get", |b| {
        b.iter(|| prototype_factory.get_as::<A>("a").unwrap())
    })
    .bench_function("factory_get_with_cache", |b| {
        let _ = singleton_factory.get_as::<A>("a").unwrap();
        b.iter(|| singleton_factory.get_as::<A>("a").unwrap())
    })
    .bench_function("factory_validate_long_chain", |b| {
        b.iter(|| chain_factory.validate().unwrap())
    })
    .bench_function("container_close", |b| b.iter(|| container_close(true)))
    .bench_function("container_close_without_pre_destroy", |b| {
        b.iter(|| container_close(false))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
