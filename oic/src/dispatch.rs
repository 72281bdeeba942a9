use oic_msg::Message;

use crate::discovery;
use crate::net::Endpoint;
use crate::req::{Method, Request};
use crate::resource::{Interface, Kind, Registry, ResourceId};
use crate::resp::{ResponseBuilder, Status};

/// The result of routing a request to a resource
#[derive(Debug)]
pub(crate) struct Routed {
  /// The resource the request was routed to, if the handler ran
  pub(crate) resource: Option<ResourceId>,
  pub(crate) method: Method,
  pub(crate) response: ResponseBuilder,
}

impl Routed {
  pub(crate) fn status(&self) -> Status {
    self.response
        .status()
        .unwrap_or(Status::InternalServerError)
  }
}

/// Route a request to its resource and run the resource's handler.
///
/// This does not act on the Observe option or notify anyone; the
/// caller decides what to do with a successful [`Routed`].
pub(crate) fn dispatch(registry: &mut Registry,
                       device_id: &str,
                       msg: &Message,
                       endpoint: Option<Endpoint>)
                       -> Routed {
  let req = Request::new(msg, endpoint);
  let method = req.method();
  let mut response = ResponseBuilder::new();

  let requested = req.query_value("if").and_then(Interface::from_name);

  let id = match registry.find_by_uri(req.path()) {
    | Some(id) => id,
    | None => {
      log::debug!(target: "oic::dispatch", "no resource at /{}", req.path());
      response.set_status(Status::NotFound);
      return Routed { resource: None,
                      method,
                      response };
    },
  };

  let (iface, allowed, kind) = match registry.get(id) {
    | Some(res) => {
      let iface = requested.unwrap_or_else(|| res.default_interface());
      (iface,
       res.interfaces().contains(iface) && iface.permits(method),
       res.kind)
    },
    | None => {
      response.set_status(Status::NotFound);
      return Routed { resource: None,
                      method,
                      response };
    },
  };

  if !allowed {
    log::debug!(target: "oic::dispatch",
                "{:?} /{} through {} rejected",
                method,
                req.path(),
                iface.name());
    response.set_status(Status::BadRequest);
    return Routed { resource: None,
                    method,
                    response };
  }

  let handled = match kind {
    | Kind::Discovery if method == Method::Get => {
      discovery::respond(registry, device_id, &req, &mut response);
      true
    },
    | Kind::Discovery => false,
    | Kind::App => registry.get_mut(id)
                           .map(|res| res.invoke(method, &req, iface, &mut response))
                           .unwrap_or(false),
  };

  if !handled {
    response.set_status(Status::MethodNotAllowed);
    return Routed { resource: None,
                    method,
                    response };
  }

  Routed { resource: Some(id),
           method,
           response }
}

/// Invoke a resource's GET handler on its default interface, as if a
/// client asked for it; used to produce notifications.
pub(crate) fn synthesize_get(registry: &mut Registry,
                             device_id: &str,
                             id: ResourceId)
                             -> Option<ResponseBuilder> {
  let mut msg = Message::new(oic_msg::Type::Non,
                             oic_msg::Code::GET,
                             oic_msg::Id(0),
                             Default::default());
  let res = registry.get(id)?;
  msg.opts.set_path(res.uri());
  let (iface, kind) = (res.default_interface(), res.kind);

  let mut response = ResponseBuilder::new();
  let req = Request::new(&msg, None);

  match kind {
    | Kind::Discovery => discovery::respond(registry, device_id, &req, &mut response),
    | Kind::App => {
      let ran = registry.get_mut(id)?
                        .invoke(Method::Get, &req, iface, &mut response);
      if !ran {
        return None;
      }
    },
  }

  Some(response)
}
