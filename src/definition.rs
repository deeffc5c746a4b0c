use core::{
    any::Any,
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
};
use std::{collections::BTreeSet, sync::Arc};

use crate::{
    any::{Bean, TypeInfo},
    dependency::{DependencyDescriptor, InjectionKind},
    errors::InstantiateErrorKind,
    inject::{Resolved, ResolvedDependencies},
    lifecycle::{DisposableBean, InitializingBean},
    scope::DefaultScope,
};

pub(crate) type Instance = Box<dyn Any + Send + Sync>;

type ConstructFn = dyn Fn(&ResolvedDependencies) -> Result<Instance, InstantiateErrorKind> + Send + Sync;
type InjectFn = dyn Fn(&mut (dyn Any + Send + Sync), &Resolved) -> Result<(), InstantiateErrorKind> + Send + Sync;
type CallbackFn = dyn Fn(&(dyn Any + Send + Sync)) -> Result<(), InstantiateErrorKind> + Send + Sync;
type ConditionFn = dyn Fn() -> bool + Send + Sync;

/// Alternate construction path: a named method, optionally owned by another bean.
#[derive(Clone)]
pub struct FactoryMethod {
    name: String,
    factory_bean: Option<String>,
    call: Arc<ConstructFn>,
}

impl FactoryMethod {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bean whose instance is resolved before the method is invoked
    #[inline]
    #[must_use]
    pub fn factory_bean(&self) -> Option<&str> {
        self.factory_bean.as_deref()
    }
}

#[derive(Clone)]
enum Construction {
    Constructor(Arc<ConstructFn>),
    FactoryMethod(FactoryMethod),
}

/// Named post-construct or pre-destroy callback
#[derive(Clone)]
pub struct LifecycleMethod {
    name: String,
    call: Arc<CallbackFn>,
}

impl LifecycleMethod {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn invoke(&self, instance: &(dyn Any + Send + Sync)) -> Result<(), InstantiateErrorKind> {
        (self.call)(instance)
    }
}

impl Debug for LifecycleMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone)]
pub(crate) struct Injector {
    pub(crate) descriptor: DependencyDescriptor,
    inject: Arc<InjectFn>,
}

impl Injector {
    pub(crate) fn inject(&self, instance: &mut (dyn Any + Send + Sync), resolved: &Resolved) -> Result<(), InstantiateErrorKind> {
        (self.inject)(instance, resolved)
    }
}

/// Immutable blueprint of a bean.
///
/// Built with [`BeanDefinition::builder`] or [`BeanDefinition::from_factory_method`].
#[derive(Clone)]
pub struct BeanDefinition {
    name: String,
    type_info: TypeInfo,
    assignable_to: Vec<TypeInfo>,
    scope: String,
    dependencies: Vec<DependencyDescriptor>,
    construction: Construction,
    injectors: Vec<Injector>,
    post_construct: Vec<LifecycleMethod>,
    pre_destroy: Vec<LifecycleMethod>,
    primary: bool,
    lazy_init: bool,
    profiles: BTreeSet<String>,
    conditions: Vec<Arc<ConditionFn>>,
    description: Option<String>,
}

impl BeanDefinition {
    /// Definition of a bean of type `T` created by `constructor`.
    ///
    /// The constructor gets the constructor-kind dependencies, resolved in declaration order.
    pub fn builder<T, F>(name: impl Into<String>, constructor: F) -> BeanDefinitionBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolvedDependencies) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        BeanDefinitionBuilder::new(name.into(), Construction::Constructor(erase_constructor(constructor)))
    }

    /// Definition of a bean of type `T` created by the factory method `method_name`.
    ///
    /// Use [`BeanDefinitionBuilder::factory_bean`] to resolve the bean owning the method first,
    /// it's available with [`ResolvedDependencies::factory_bean`].
    pub fn from_factory_method<T, F>(
        name: impl Into<String>,
        method_name: impl Into<String>,
        factory: F,
    ) -> BeanDefinitionBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolvedDependencies) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        BeanDefinitionBuilder::new(
            name.into(),
            Construction::FactoryMethod(FactoryMethod {
                name: method_name.into(),
                factory_bean: None,
                call: erase_constructor(factory),
            }),
        )
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// Extra types the bean can be looked up by
    #[inline]
    #[must_use]
    pub fn assignable_to(&self) -> &[TypeInfo] {
        &self.assignable_to
    }

    #[must_use]
    pub fn is_assignable_to(&self, type_info: &TypeInfo) -> bool {
        self.type_info == *type_info || self.assignable_to.contains(type_info)
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// All dependencies in declaration order
    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> &[DependencyDescriptor] {
        &self.dependencies
    }

    pub fn constructor_dependencies(&self) -> impl Iterator<Item = &DependencyDescriptor> {
        self.dependencies
            .iter()
            .filter(|descriptor| descriptor.injection_kind == InjectionKind::Constructor)
    }

    #[inline]
    #[must_use]
    pub fn factory_method(&self) -> Option<&FactoryMethod> {
        match &self.construction {
            Construction::FactoryMethod(factory_method) => Some(factory_method),
            Construction::Constructor(_) => None,
        }
    }

    /// Setter injectors first, then field injectors, each kind in declaration order
    pub(crate) fn injectors(&self) -> impl Iterator<Item = &Injector> {
        let setters = self
            .injectors
            .iter()
            .filter(|injector| injector.descriptor.injection_kind == InjectionKind::Setter);
        let fields = self
            .injectors
            .iter()
            .filter(|injector| injector.descriptor.injection_kind == InjectionKind::Field);
        setters.chain(fields)
    }

    pub(crate) fn construct(&self, dependencies: &ResolvedDependencies) -> Result<Instance, InstantiateErrorKind> {
        match &self.construction {
            Construction::Constructor(call) | Construction::FactoryMethod(FactoryMethod { call, .. }) => call(dependencies),
        }
    }

    #[inline]
    #[must_use]
    pub fn post_construct_methods(&self) -> &[LifecycleMethod] {
        &self.post_construct
    }

    #[inline]
    #[must_use]
    pub fn pre_destroy_methods(&self) -> &[LifecycleMethod] {
        &self.pre_destroy
    }

    #[inline]
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.primary
    }

    #[inline]
    #[must_use]
    pub const fn is_lazy_init(&self) -> bool {
        self.lazy_init
    }

    #[inline]
    #[must_use]
    pub fn profiles(&self) -> &BTreeSet<String> {
        &self.profiles
    }

    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// A definition is eligible if it declares no profiles or one of them is active,
    /// and all of its conditions hold
    #[must_use]
    pub fn is_eligible(&self, active_profiles: &BTreeSet<String>) -> bool {
        (self.profiles.is_empty() || !self.profiles.is_disjoint(active_profiles))
            && self.conditions.iter().all(|condition| condition())
    }
}

impl Debug for BeanDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("type_info", &self.type_info.name)
            .field("scope", &self.scope)
            .field("dependencies", &self.dependencies)
            .field("factory_method", &self.factory_method().map(FactoryMethod::name))
            .field("post_construct", &self.post_construct)
            .field("pre_destroy", &self.pre_destroy)
            .field("primary", &self.primary)
            .field("lazy_init", &self.lazy_init)
            .field("profiles", &self.profiles)
            .finish_non_exhaustive()
    }
}

fn erase_constructor<T, F>(constructor: F) -> Arc<ConstructFn>
where
    T: Send + Sync + 'static,
    F: Fn(&ResolvedDependencies) -> anyhow::Result<T> + Send + Sync + 'static,
{
    Arc::new(move |dependencies: &ResolvedDependencies| -> Result<Instance, InstantiateErrorKind> {
        let instance = constructor(dependencies)?;
        Ok(Box::new(instance) as Instance)
    })
}

fn incorrect_instance<T: 'static>(instance: &(dyn Any + Send + Sync)) -> InstantiateErrorKind {
    InstantiateErrorKind::IncorrectType {
        expected: TypeInfo::of::<T>(),
        actual: instance.type_id(),
    }
}

fn downcast_dependency<D: Send + Sync + 'static>(bean: &Bean) -> Result<Arc<D>, InstantiateErrorKind> {
    bean.clone().downcast::<D>().map_err(|bean| incorrect_instance::<D>(&*bean))
}

/// Builder of [`BeanDefinition`] for a bean of type `T`
pub struct BeanDefinitionBuilder<T> {
    definition: BeanDefinition,
    _marker: PhantomData<fn() -> T>,
}

impl<T> BeanDefinitionBuilder<T>
where
    T: Send + Sync + 'static,
{
    fn new(name: String, construction: Construction) -> Self {
        Self {
            definition: BeanDefinition {
                name,
                type_info: TypeInfo::of::<T>(),
                assignable_to: Vec::new(),
                scope: DefaultScope::Singleton.into(),
                dependencies: Vec::new(),
                construction,
                injectors: Vec::new(),
                post_construct: Vec::new(),
                pre_destroy: Vec::new(),
                primary: false,
                lazy_init: false,
                profiles: BTreeSet::new(),
                conditions: Vec::new(),
                description: None,
            },
            _marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.definition.scope = scope.into();
        self
    }

    /// Dependency passed to the constructor or factory method
    #[inline]
    #[must_use]
    pub fn constructor_dependency(mut self, descriptor: DependencyDescriptor) -> Self {
        self.definition
            .dependencies
            .push(descriptor.with_kind(InjectionKind::Constructor));
        self
    }

    fn injector(mut self, descriptor: DependencyDescriptor, inject: Arc<InjectFn>) -> Self {
        self.definition.dependencies.push(descriptor.clone());
        self.definition.injectors.push(Injector { descriptor, inject });
        self
    }

    fn single<D, F>(self, descriptor: DependencyDescriptor, kind: InjectionKind, inject: F) -> Self
    where
        D: Send + Sync + 'static,
        F: Fn(&mut T, Option<Arc<D>>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let descriptor = descriptor.with_kind(kind);
        let dependency = descriptor.name.clone();
        self.injector(
            descriptor,
            Arc::new(
                move |instance: &mut (dyn Any + Send + Sync), resolved: &Resolved| -> Result<(), InstantiateErrorKind> {
                    let value = match resolved {
                        Resolved::Single(Some(bean)) => Some(downcast_dependency::<D>(bean)?),
                        Resolved::Single(None) => None,
                        Resolved::Collection(_) => {
                            return Err(anyhow::anyhow!("Dependency `{dependency}` is a collection").into());
                        }
                    };
                    let actual = (*instance).type_id();
                    let target = instance.downcast_mut::<T>().ok_or(InstantiateErrorKind::IncorrectType {
                        expected: TypeInfo::of::<T>(),
                        actual,
                    })?;
                    inject(target, value).map_err(InstantiateErrorKind::Custom)
                },
            ),
        )
    }

    /// Dependency applied through `setter` once the bean is constructed.
    /// An optional dependency that wasn't found is passed as `None`
    #[inline]
    #[must_use]
    pub fn setter<D, F>(self, descriptor: DependencyDescriptor, setter: F) -> Self
    where
        D: Send + Sync + 'static,
        F: Fn(&mut T, Option<Arc<D>>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.single(descriptor, InjectionKind::Setter, setter)
    }

    /// Same as [`Self::setter`], applied after all setters
    #[inline]
    #[must_use]
    pub fn field<D, F>(self, descriptor: DependencyDescriptor, assign: F) -> Self
    where
        D: Send + Sync + 'static,
        F: Fn(&mut T, Option<Arc<D>>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.single(descriptor, InjectionKind::Field, assign)
    }

    /// Collection dependency applied through `setter`, see [`DependencyDescriptor::all_of_type`]
    #[must_use]
    pub fn setter_all<D, F>(self, descriptor: DependencyDescriptor, setter: F) -> Self
    where
        D: Send + Sync + 'static,
        F: Fn(&mut T, Vec<Arc<D>>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let descriptor = descriptor.with_kind(InjectionKind::Setter);
        let dependency = descriptor.name.clone();
        self.injector(
            descriptor,
            Arc::new(
                move |instance: &mut (dyn Any + Send + Sync), resolved: &Resolved| -> Result<(), InstantiateErrorKind> {
                    let values = match resolved {
                        Resolved::Collection(beans) => beans
                            .iter()
                            .map(|(_, bean)| downcast_dependency::<D>(bean))
                            .collect::<Result<Vec<_>, _>>()?,
                        Resolved::Single(_) => {
                            return Err(anyhow::anyhow!("Dependency `{dependency}` isn't a collection").into());
                        }
                    };
                    let actual = (*instance).type_id();
                    let target = instance.downcast_mut::<T>().ok_or(InstantiateErrorKind::IncorrectType {
                        expected: TypeInfo::of::<T>(),
                        actual,
                    })?;
                    setter(target, values).map_err(InstantiateErrorKind::Custom)
                },
            ),
        )
    }

    fn lifecycle_method<F>(name: impl Into<String>, method: F) -> LifecycleMethod
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        LifecycleMethod {
            name: name.into(),
            call: Arc::new(move |instance: &(dyn Any + Send + Sync)| -> Result<(), InstantiateErrorKind> {
                let target = instance
                    .downcast_ref::<T>()
                    .ok_or_else(|| incorrect_instance::<T>(instance))?;
                method(target).map_err(InstantiateErrorKind::Custom)
            }),
        }
    }

    /// Callback run after injection, in declaration order
    #[inline]
    #[must_use]
    pub fn post_construct<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.definition.post_construct.push(Self::lifecycle_method(name, method));
        self
    }

    /// Callback run when the instance is discarded by its scope, in declaration order
    #[inline]
    #[must_use]
    pub fn pre_destroy<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.definition.pre_destroy.push(Self::lifecycle_method(name, method));
        self
    }

    /// Adds [`InitializingBean::after_properties_set`] as a post-construct method
    #[inline]
    #[must_use]
    pub fn initializing(self) -> Self
    where
        T: InitializingBean,
    {
        self.post_construct("after_properties_set", T::after_properties_set)
    }

    /// Adds [`DisposableBean::destroy`] as a pre-destroy method
    #[inline]
    #[must_use]
    pub fn disposable(self) -> Self
    where
        T: DisposableBean,
    {
        self.pre_destroy("destroy", T::destroy)
    }

    /// Bean owning the factory method, no-op for constructor definitions
    #[inline]
    #[must_use]
    pub fn factory_bean(mut self, name: impl Into<String>) -> Self {
        if let Construction::FactoryMethod(factory_method) = &mut self.definition.construction {
            factory_method.factory_bean = Some(name.into());
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.definition.primary = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn lazy(mut self, lazy_init: bool) -> Self {
        self.definition.lazy_init = lazy_init;
        self
    }

    #[inline]
    #[must_use]
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.definition.profiles.insert(profile.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.definition.conditions.push(Arc::new(condition));
        self
    }

    /// Makes the bean available to lookups by `U`, usually a trait object type the bean implements.
    ///
    /// This is lookup metadata only, the instance is still stored as a `T`.
    #[inline]
    #[must_use]
    pub fn assignable_to<U: ?Sized + 'static>(mut self) -> Self {
        let type_info = TypeInfo::of::<U>();
        if !self.definition.is_assignable_to(&type_info) {
            self.definition.assignable_to.push(type_info);
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = Some(description.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn build(self) -> BeanDefinition {
        self.definition
    }
}

impl<T: Send + Sync + 'static> From<BeanDefinitionBuilder<T>> for BeanDefinition {
    fn from(builder: BeanDefinitionBuilder<T>) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::BeanDefinition;
    use crate::{
        any::{Bean, TypeInfo},
        dependency::{DependencyDescriptor, InjectionKind},
        errors::InstantiateErrorKind,
        inject::{Resolved, ResolvedDependencies},
        lifecycle::{DisposableBean, InitializingBean},
        scope::DefaultScope,
    };

    use core::sync::atomic::{AtomicBool, Ordering};
    use std::{collections::BTreeSet, sync::Arc};

    trait Greeter: Send + Sync {}

    #[derive(Default)]
    struct Service {
        repository: Option<Arc<u8>>,
        initialized: AtomicBool,
    }

    impl Greeter for Service {}

    impl InitializingBean for Service {
        fn after_properties_set(&self) -> anyhow::Result<()> {
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    impl DisposableBean for Service {
        fn destroy(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn service_definition() -> BeanDefinition {
        BeanDefinition::builder("service", |_| Ok(Service::default()))
            .scope(DefaultScope::Prototype)
            .constructor_dependency(DependencyDescriptor::of_type::<u16>("port"))
            .setter(DependencyDescriptor::of_type::<u8>("repository").optional(), |service: &mut Service, repository| {
                service.repository = repository;
                Ok(())
            })
            .post_construct("open", |_: &Service| Ok(()))
            .initializing()
            .disposable()
            .assignable_to::<dyn Greeter>()
            .description("greets users")
            .build()
    }

    #[test]
    fn test_builder() {
        let definition = service_definition();

        assert_eq!(definition.name(), "service");
        assert_eq!(definition.scope(), "prototype");
        assert_eq!(definition.type_info(), TypeInfo::of::<Service>());
        assert!(definition.is_assignable_to(&TypeInfo::of::<dyn Greeter>()));
        assert!(!definition.is_assignable_to(&TypeInfo::of::<u8>()));
        assert_eq!(definition.description(), Some("greets users"));
        assert!(definition.factory_method().is_none());

        let kinds = definition
            .dependencies()
            .iter()
            .map(|descriptor| descriptor.injection_kind)
            .collect::<Vec<_>>();
        assert_eq!(kinds, [InjectionKind::Constructor, InjectionKind::Setter]);
        assert_eq!(definition.constructor_dependencies().count(), 1);

        let post_construct = definition
            .post_construct_methods()
            .iter()
            .map(|method| method.name())
            .collect::<Vec<_>>();
        assert_eq!(post_construct, ["open", "after_properties_set"]);
        assert_eq!(definition.pre_destroy_methods()[0].name(), "destroy");
    }

    #[test]
    fn test_construct_inject_and_initialize() {
        let definition = service_definition();

        let mut instance = definition.construct(&ResolvedDependencies::new()).unwrap();
        for injector in definition.injectors() {
            injector
                .inject(instance.as_mut(), &Resolved::Single(Some(Arc::new(7u8) as Bean)))
                .unwrap();
        }
        for method in definition.post_construct_methods() {
            method.invoke(instance.as_ref()).unwrap();
        }

        let service = instance.downcast::<Service>().unwrap();
        assert_eq!(service.repository.as_deref(), Some(&7));
        assert!(service.initialized.load(Ordering::SeqCst));
    }

    #[test]
    fn test_callback_on_wrong_type() {
        let definition = service_definition();

        let err = definition.post_construct_methods()[0].invoke(&1u8).unwrap_err();
        assert!(matches!(err, InstantiateErrorKind::IncorrectType { .. }));

        let mut wrong = Box::new(1u8);
        let err = definition
            .injectors()
            .next()
            .unwrap()
            .inject(wrong.as_mut(), &Resolved::Single(None))
            .unwrap_err();
        assert!(matches!(err, InstantiateErrorKind::IncorrectType { .. }));
    }

    #[test]
    fn test_factory_method() {
        let definition = BeanDefinition::from_factory_method("port", "port", |deps| {
            let base = deps.factory_bean::<u16>()?;
            Ok(*base + 1)
        })
        .factory_bean("config")
        .build();

        let factory_method = definition.factory_method().unwrap();
        assert_eq!(factory_method.name(), "port");
        assert_eq!(factory_method.factory_bean(), Some("config"));

        let mut deps = ResolvedDependencies::new();
        deps.set_factory_bean("config", Arc::new(8080u16));
        let instance = definition.construct(&deps).unwrap();
        assert_eq!(*instance.downcast::<u16>().unwrap(), 8081);
    }

    #[test]
    fn test_eligibility() {
        let active = BTreeSet::from(["dev".to_owned()]);

        let always = BeanDefinition::builder("a", |_| Ok(())).build();
        let dev = BeanDefinition::builder("b", |_| Ok(())).profile("dev").profile("test").build();
        let prod = BeanDefinition::builder("c", |_| Ok(())).profile("prod").build();
        let disabled = BeanDefinition::builder("d", |_| Ok(())).condition(|| false).build();

        assert!(always.is_eligible(&active));
        assert!(dev.is_eligible(&active));
        assert!(!prod.is_eligible(&active));
        assert!(!disabled.is_eligible(&active));
    }
}
