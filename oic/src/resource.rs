use core::fmt;
use core::ops::BitOr;

use embedded_time::duration::Milliseconds;
use std_alloc::boxed::Box;
use std_alloc::string::{String, ToString};
use std_alloc::vec::Vec;

use crate::pool::{Handle, Slab};
use crate::req::{Method, Request};
use crate::resp::ResponseBuilder;
use crate::time::{Millis, Timer};

/// OCF resource interfaces.
///
/// An interface is a view of a resource; requests select one
/// with an `if=` query parameter.
///
/// | interface  | name              | methods |
/// |------------|-------------------|---------|
/// | `Baseline` | `oic.if.baseline` | all     |
/// | `LinkList` | `oic.if.ll`       | GET     |
/// | `Batch`    | `oic.if.b`        | all     |
/// | `ReadOnly` | `oic.if.r`        | GET     |
/// | `ReadWrite`| `oic.if.rw`       | all     |
/// | `Actuator` | `oic.if.a`        | all     |
/// | `Sensor`   | `oic.if.s`        | GET     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum Interface {
  Baseline,
  LinkList,
  Batch,
  ReadOnly,
  ReadWrite,
  Actuator,
  Sensor,
}

impl Interface {
  /// Every interface, in mask bit order
  pub const ALL: [Interface; 7] = [Interface::Baseline,
                                   Interface::LinkList,
                                   Interface::Batch,
                                   Interface::ReadOnly,
                                   Interface::ReadWrite,
                                   Interface::Actuator,
                                   Interface::Sensor];

  /// The interface's name, as used in `if=` queries and discovery payloads
  pub fn name(&self) -> &'static str {
    match self {
      | Interface::Baseline => "oic.if.baseline",
      | Interface::LinkList => "oic.if.ll",
      | Interface::Batch => "oic.if.b",
      | Interface::ReadOnly => "oic.if.r",
      | Interface::ReadWrite => "oic.if.rw",
      | Interface::Actuator => "oic.if.a",
      | Interface::Sensor => "oic.if.s",
    }
  }

  /// Exact match on an interface name
  ///
  /// ```
  /// use oic::resource::Interface;
  ///
  /// assert_eq!(Interface::from_name("oic.if.rw"), Some(Interface::ReadWrite));
  /// assert_eq!(Interface::from_name("oic.if.r "), None);
  /// ```
  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|i| i.name() == name)
  }

  /// This interface's bit
  pub fn mask(&self) -> InterfaceMask {
    match self {
      | Interface::Baseline => InterfaceMask::BASELINE,
      | Interface::LinkList => InterfaceMask::LL,
      | Interface::Batch => InterfaceMask::B,
      | Interface::ReadOnly => InterfaceMask::R,
      | Interface::ReadWrite => InterfaceMask::RW,
      | Interface::Actuator => InterfaceMask::A,
      | Interface::Sensor => InterfaceMask::S,
    }
  }

  /// May `method` be used through this interface?
  ///
  /// ```
  /// use oic::req::Method;
  /// use oic::resource::Interface;
  ///
  /// assert!(Interface::ReadOnly.permits(Method::Get));
  /// assert!(!Interface::ReadOnly.permits(Method::Put));
  /// assert!(Interface::Actuator.permits(Method::Post));
  /// ```
  pub fn permits(&self, method: Method) -> bool {
    match self {
      | Interface::LinkList | Interface::Sensor | Interface::ReadOnly => method == Method::Get,
      | Interface::ReadWrite | Interface::Batch | Interface::Baseline | Interface::Actuator => true,
    }
  }
}

/// A set of [`Interface`]s
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceMask(pub u8);

#[allow(missing_docs)]
impl InterfaceMask {
  pub const BASELINE: Self = Self(1 << 1);
  pub const LL: Self = Self(1 << 2);
  pub const B: Self = Self(1 << 3);
  pub const R: Self = Self(1 << 4);
  pub const RW: Self = Self(1 << 5);
  pub const A: Self = Self(1 << 6);
  pub const S: Self = Self(1 << 7);
}

impl InterfaceMask {
  /// Is `iface` in this set?
  pub fn contains(&self, iface: Interface) -> bool {
    self.0 & iface.mask().0 != 0
  }

  /// The interfaces in this set
  pub fn iter(&self) -> impl Iterator<Item = Interface> {
    let mask = *self;
    Interface::ALL.into_iter().filter(move |i| mask.contains(*i))
  }
}

impl BitOr for InterfaceMask {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self {
    Self(self.0 | rhs.0)
  }
}

impl From<Interface> for InterfaceMask {
  fn from(iface: Interface) -> Self {
    iface.mask()
  }
}

/// Resource property bits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Properties(pub u8);

#[allow(missing_docs)]
impl Properties {
  pub const DISCOVERABLE: Self = Self(1 << 0);
  pub const OBSERVABLE: Self = Self(1 << 1);
  pub const ACTIVE: Self = Self(1 << 2);
  pub const SECURE: Self = Self(1 << 4);
  pub const PERIODIC: Self = Self(1 << 6);
}

impl Properties {
  /// Are all bits of `other` set?
  pub fn contains(&self, other: Properties) -> bool {
    self.0 & other.0 == other.0
  }
}

impl BitOr for Properties {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self {
    Self(self.0 | rhs.0)
  }
}

/// A method handler.
///
/// Handlers receive the request and the selected interface, and
/// fill in the response.
pub type Handler = Box<dyn FnMut(&Request<'_>, Interface, &mut ResponseBuilder)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
  App,
  Discovery,
}

/// An addressable resource
///
/// ```
/// use oic::req::Method;
/// use oic::resource::{Interface, InterfaceMask, Properties, Resource};
/// use oic::resp::Status;
///
/// let light = Resource::new("/light/1").with_type("oic.r.light")
///                                      .with_interfaces(InterfaceMask::RW)
///                                      .with_default_interface(Interface::ReadWrite)
///                                      .with_properties(Properties::DISCOVERABLE
///                                                       | Properties::OBSERVABLE)
///                                      .with_handler(Method::Get, |_, _, resp| {
///                                        resp.set_status(Status::Ok);
///                                      });
///
/// assert_eq!(light.uri(), "/light/1");
/// assert!(light.interfaces().contains(Interface::Baseline));
/// assert!(light.has_handler(Method::Get));
/// assert!(!light.has_handler(Method::Put));
/// ```
pub struct Resource {
  uri: String,
  types: Vec<String>,
  interfaces: InterfaceMask,
  default_interface: Interface,
  properties: Properties,
  period: Millis,
  handlers: [Option<Handler>; 4],
  pub(crate) num_observers: usize,
  pub(crate) timer: Timer,
  pub(crate) kind: Kind,
}

impl fmt::Debug for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let methods = Method::ALL.into_iter()
                             .filter(|m| self.has_handler(*m))
                             .collect::<Vec<_>>();

    f.debug_struct("Resource")
     .field("uri", &self.uri)
     .field("types", &self.types)
     .field("interfaces", &self.interfaces)
     .field("default_interface", &self.default_interface)
     .field("properties", &self.properties)
     .field("period", &self.period)
     .field("handlers", &methods)
     .field("num_observers", &self.num_observers)
     .finish()
  }
}

impl Resource {
  /// Create a resource at `uri` (a leading `/` is added if missing).
  ///
  /// New resources support [`Interface::Baseline`] (also the default)
  /// and have no properties and no handlers.
  pub fn new(uri: impl AsRef<str>) -> Self {
    let uri = uri.as_ref();
    let uri = if uri.starts_with('/') {
      uri.to_string()
    } else {
      let mut s = String::from("/");
      s.push_str(uri);
      s
    };

    Self { uri,
           types: Vec::new(),
           interfaces: InterfaceMask::BASELINE,
           default_interface: Interface::Baseline,
           properties: Properties::default(),
           period: Milliseconds(0),
           handlers: [None, None, None, None],
           num_observers: 0,
           timer: Timer::default(),
           kind: Kind::App }
  }

  pub(crate) fn discovery() -> Self {
    let mut res = Self::new("/oic/res").with_type("oic.wk.res")
                                       .with_interfaces(InterfaceMask::LL)
                                       .with_default_interface(Interface::LinkList);
    res.kind = Kind::Discovery;
    res
  }

  /// Add a resource type (`rt`)
  pub fn with_type(mut self, rt: impl AsRef<str>) -> Self {
    self.types.push(rt.as_ref().to_string());
    self
  }

  /// Add supported interfaces; baseline is always supported
  pub fn with_interfaces(mut self, interfaces: InterfaceMask) -> Self {
    self.interfaces = self.interfaces | interfaces;
    self
  }

  /// Interface used when a request does not select one
  pub fn with_default_interface(mut self, iface: Interface) -> Self {
    self.default_interface = iface;
    self.interfaces = self.interfaces | iface.mask();
    self
  }

  /// Set property bits
  pub fn with_properties(mut self, properties: Properties) -> Self {
    self.properties = self.properties | properties;
    self
  }

  /// Make the resource observable, with notifications driven by a
  /// timer every `period` for as long as it is observed
  pub fn with_periodic_observe(mut self, period: Millis) -> Self {
    self.properties = self.properties | Properties::OBSERVABLE | Properties::PERIODIC;
    self.period = period;
    self
  }

  /// Set the handler for `method`
  pub fn with_handler<F>(mut self, method: Method, handler: F) -> Self
    where F: FnMut(&Request<'_>, Interface, &mut ResponseBuilder) + 'static
  {
    self.handlers[method.index()] = Some(Box::new(handler));
    self
  }

  /// Path, with a leading `/`
  pub fn uri(&self) -> &str {
    &self.uri
  }

  /// Resource types
  pub fn types(&self) -> &[String] {
    &self.types
  }

  /// Supported interfaces
  pub fn interfaces(&self) -> InterfaceMask {
    self.interfaces
  }

  /// See [`Resource::with_default_interface`]
  pub fn default_interface(&self) -> Interface {
    self.default_interface
  }

  /// Property bits
  pub fn properties(&self) -> Properties {
    self.properties
  }

  /// Period of periodic observation
  pub fn period(&self) -> Millis {
    self.period
  }

  /// Number of observers
  pub fn num_observers(&self) -> usize {
    self.num_observers
  }

  /// Is there a handler for `method`?
  pub fn has_handler(&self, method: Method) -> bool {
    match self.kind {
      | Kind::Discovery => method == Method::Get,
      | Kind::App => self.handlers[method.index()].is_some(),
    }
  }

  #[allow(missing_docs)]
  pub fn is_observable(&self) -> bool {
    self.properties.contains(Properties::OBSERVABLE)
  }

  #[allow(missing_docs)]
  pub fn is_discoverable(&self) -> bool {
    self.properties.contains(Properties::DISCOVERABLE)
  }

  #[allow(missing_docs)]
  pub fn is_periodic(&self) -> bool {
    self.properties.contains(Properties::PERIODIC)
  }

  /// Run the handler for `method`; `false` if there is none
  pub(crate) fn invoke(&mut self,
                       method: Method,
                       req: &Request<'_>,
                       iface: Interface,
                       resp: &mut ResponseBuilder)
                       -> bool {
    match self.handlers[method.index()].as_mut() {
      | Some(handler) => {
        handler(req, iface, resp);
        true
      },
      | None => false,
    }
  }
}

/// Identifies a resource in a [`Registry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceId {
  /// A resource the stack provides (`/oic/res`)
  Core(usize),
  /// A resource the application registered
  App(Handle),
}

/// Why a resource could not be registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
  /// The resource has no method handlers
  NoHandlers,
  /// The resource is periodic, but its period is zero
  ZeroPeriod,
  /// No free application resource slots
  Full,
}

/// The set of resources a device hosts.
///
/// Core resources come first and cannot be removed; application
/// resources live in a fixed-capacity pool.
#[derive(Debug)]
pub struct Registry {
  core: Vec<Resource>,
  app: Slab<Resource>,
}

impl Registry {
  /// Create a registry with room for `max_app_resources`
  pub fn new(max_app_resources: usize) -> Self {
    Self { core: [Resource::discovery()].into_iter().collect(),
           app: Slab::with_capacity(max_app_resources) }
  }

  /// Add an application resource
  pub fn register(&mut self, resource: Resource) -> Result<ResourceId, RegisterError> {
    if !Method::ALL.iter().any(|m| resource.has_handler(*m)) {
      return Err(RegisterError::NoHandlers);
    }

    if resource.is_periodic() && resource.period.0 == 0 {
      return Err(RegisterError::ZeroPeriod);
    }

    self.app
        .insert(resource)
        .map(ResourceId::App)
        .map_err(|_| RegisterError::Full)
  }

  /// Find a resource by exact (case-sensitive) path.
  ///
  /// The leading `/` is optional.
  ///
  /// ```
  /// use oic::req::Method;
  /// use oic::resource::{Registry, Resource, ResourceId};
  ///
  /// let mut reg = Registry::new(1);
  /// let id = reg.register(Resource::new("/a").with_handler(Method::Get, |_, _, _| ()))
  ///             .unwrap();
  ///
  /// assert_eq!(reg.find_by_uri("a"), Some(id));
  /// assert_eq!(reg.find_by_uri("/A"), None);
  /// assert_eq!(reg.find_by_uri("oic/res"), Some(ResourceId::Core(0)));
  /// ```
  pub fn find_by_uri(&self, path: &str) -> Option<ResourceId> {
    let path = path.trim_start_matches('/');
    self.iter()
        .find(|(_, r)| &r.uri[1..] == path)
        .map(|(id, _)| id)
  }

  /// Borrow a resource
  pub fn get(&self, id: ResourceId) -> Option<&Resource> {
    match id {
      | ResourceId::Core(ix) => self.core.get(ix),
      | ResourceId::App(h) => self.app.get(h),
    }
  }

  /// Mutably borrow a resource
  pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
    match id {
      | ResourceId::Core(ix) => self.core.get_mut(ix),
      | ResourceId::App(h) => self.app.get_mut(h),
    }
  }

  /// Remove an application resource
  pub fn remove(&mut self, id: ResourceId) -> Option<Resource> {
    match id {
      | ResourceId::Core(_) => None,
      | ResourceId::App(h) => self.app.remove(h),
    }
  }

  /// Every resource, core resources first
  pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &Resource)> {
    self.core
        .iter()
        .enumerate()
        .map(|(ix, r)| (ResourceId::Core(ix), r))
        .chain(self.app.iter().map(|(h, r)| (ResourceId::App(h), r)))
  }

  pub(crate) fn ids(&self) -> Vec<ResourceId> {
    self.iter().map(|(id, _)| id).collect()
  }
}
