use crate::error::NamingError;
use crate::naming::{self, NamingPolicy};

/// One RPC method: its declared name and the fully qualified names of its
/// input and output message types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    input_type: String,
    output_type: String,
}

impl MethodDescriptor {
    pub fn new(
        name: impl Into<String>,
        input_type: impl Into<String>,
        output_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input_type: input_type.into(),
            output_type: output_type.into(),
        }
    }

    /// Describe a method whose type tags come from the message types themselves.
    pub fn typed<I: prost::Name, O: prost::Name>(name: impl Into<String>) -> Self {
        Self::new(name, I::full_name(), O::full_name())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_type(&self) -> &str {
        &self.input_type
    }

    pub fn output_type(&self) -> &str {
        &self.output_type
    }
}

/// A service as declared in the schema: package, name, and methods in
/// declaration order.
///
/// Built once at registration time and shared read-only by the dispatcher
/// and clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    package: String,
    service: String,
    methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(package: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            service: service.into(),
            methods: Vec::new(),
        }
    }

    /// Append a method.
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Returns the full service name: `{package}.{service}`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.package, self.service)
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|method| method.name == name)
    }

    /// The path for `method` under `policy`.
    pub fn path(
        &self,
        policy: NamingPolicy,
        prefix: &str,
        method: &MethodDescriptor,
    ) -> Result<String, NamingError> {
        naming::path_for(policy, prefix, &self.package, &self.service, &method.name)
    }
}
