pub mod repo;

/// Codes granted on account activation, on top of `quotes:read` from
/// registration.
pub const ACTIVATED_PERMISSIONS: &[&str] = &[
    "quotes:write",
    "goals:read",
    "goals:write",
    "study_sessions:read",
    "study_sessions:write",
    "users:read",
    "users:write",
];

/// Flat set of permission codes held by one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(Vec<String>);

impl Permissions {
    pub fn include(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }
}

impl FromIterator<String> for Permissions {
    fn from_iter<I: IntoIterator<Item = String>>(codes: I) -> Self {
        Self(codes.into_iter().collect())
    }
}

/// A permission a route can demand through `auth::Permitted<P>`.
pub trait PermissionCode: Send + Sync + 'static {
    const CODE: &'static str;
}

macro_rules! permission_codes {
    ($($name:ident => $code:literal),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy)]
            pub struct $name;

            impl PermissionCode for $name {
                const CODE: &'static str = $code;
            }
        )*
    };
}

permission_codes! {
    QuotesRead => "quotes:read",
    QuotesWrite => "quotes:write",
    GoalsRead => "goals:read",
    GoalsWrite => "goals:write",
    StudySessionsRead => "study_sessions:read",
    StudySessionsWrite => "study_sessions:write",
    UsersRead => "users:read",
    UsersWrite => "users:write",
}
