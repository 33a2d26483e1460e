//! In-memory store for development and tests.
//!
//! Uniqueness is enforced through side index maps keyed on lowercased
//! values, so lookups and conflicts are case-insensitive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::types::{
    CreateCustomer, CreateCustomerUser, CreateEmailAddress, CreateMessage, CreatePermission,
    CreateRole, CreateSession, CreateUser, CreateVerification, Customer, CustomerUser,
    EmailAddress, Message, Permission, Role, Session, UpdateCustomer, UpdateCustomerUser,
    UpdateMessage, UpdateUser, User, Verification, VerificationPurpose,
};

use super::IdentityStore;

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, User>>,
    email_index: Mutex<HashMap<String, String>>,
    username_index: Mutex<HashMap<String, String>>,

    email_addresses: Mutex<HashMap<String, EmailAddress>>,

    customers: Mutex<HashMap<String, Customer>>,
    customer_name_index: Mutex<HashMap<String, String>>,

    customer_users: Mutex<HashMap<String, CustomerUser>>,

    permissions: Mutex<HashMap<String, Permission>>,
    roles: Mutex<HashMap<String, Role>>,

    messages: Mutex<HashMap<String, Message>>,
    verifications: Mutex<HashMap<String, Verification>>,
    sessions: Mutex<HashMap<String, Session>>,

    profiles: Mutex<HashMap<String, HashMap<String, serde_json::Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn norm(value: &str) -> String {
    value.trim().to_lowercase()
}

fn permission_name_is_valid(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
}

#[async_trait]
impl IdentityStore for MemoryStore {
    // -- users -------------------------------------------------------------

    async fn create_user(&self, create: CreateUser) -> AuthResult<User> {
        let mut users = self.users.lock().unwrap();
        let mut email_index = self.email_index.lock().unwrap();
        let mut username_index = self.username_index.lock().unwrap();

        let email_key = norm(&create.email);
        if email_index.contains_key(&email_key) {
            return Err(AuthError::conflict("A user with this email already exists"));
        }
        let username_key = create.username.as_deref().map(norm);
        if let Some(key) = &username_key
            && username_index.contains_key(key)
        {
            return Err(AuthError::conflict(
                "A user with this username already exists",
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: create.email,
            username: create.username,
            name: create.name,
            password_hash: create.password_hash,
            is_active: create.is_active,
            is_approved: create.is_approved,
            is_admin: create.is_admin,
            accepted_terms: create.accepted_terms,
            change_password: create.change_password,
            registration_stage: create.registration_stage,
            last_verification_id: None,
            role_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        email_index.insert(email_key, user.id.clone());
        if let Some(key) = username_key {
            username_index.insert(key, user.id.clone());
        }
        users.insert(user.id.clone(), user.clone());

        Ok(user)
    }

    async fn get_user_by_id(&self, id: &str) -> AuthResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let id = self.email_index.lock().unwrap().get(&norm(email)).cloned();
        Ok(id.and_then(|id| self.users.lock().unwrap().get(&id).cloned()))
    }

    async fn get_user_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        let id = self
            .username_index
            .lock()
            .unwrap()
            .get(&norm(username))
            .cloned();
        Ok(id.and_then(|id| self.users.lock().unwrap().get(&id).cloned()))
    }

    async fn update_user(&self, id: &str, update: UpdateUser) -> AuthResult<User> {
        let mut users = self.users.lock().unwrap();
        let mut username_index = self.username_index.lock().unwrap();

        if let Some(username) = &update.username {
            let key = norm(username);
            if let Some(owner) = username_index.get(&key)
                && owner != id
            {
                return Err(AuthError::conflict(
                    "A user with this username already exists",
                ));
            }
        }

        let user = users
            .get_mut(id)
            .ok_or_else(|| AuthError::UserNotFound)?;

        if let Some(username) = update.username {
            if let Some(old) = &user.username {
                username_index.remove(&norm(old));
            }
            username_index.insert(norm(&username), id.to_string());
            user.username = Some(username);
        }
        if let Some(name) = update.name {
            user.name = Some(name);
        }
        if let Some(hash) = update.password_hash {
            user.password_hash = hash;
        }
        if let Some(v) = update.is_active {
            user.is_active = v;
        }
        if let Some(v) = update.is_approved {
            user.is_approved = v;
        }
        if let Some(v) = update.accepted_terms {
            user.accepted_terms = v;
        }
        if let Some(v) = update.change_password {
            user.change_password = v;
        }
        if let Some(stage) = update.registration_stage {
            user.registration_stage = stage;
        }
        if let Some(vid) = update.last_verification_id {
            user.last_verification_id = vid;
        }
        if let Some(roles) = update.role_ids {
            user.role_ids = roles;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn delete_user(&self, id: &str) -> AuthResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.remove(id).ok_or(AuthError::UserNotFound)?;

        self.email_index.lock().unwrap().remove(&norm(&user.email));
        if let Some(username) = &user.username {
            self.username_index.lock().unwrap().remove(&norm(username));
        }
        self.email_addresses
            .lock()
            .unwrap()
            .retain(|_, e| e.user_id != id);
        self.customer_users
            .lock()
            .unwrap()
            .retain(|_, m| m.user_id != id);
        self.sessions.lock().unwrap().retain(|_, s| s.user_id != id);
        self.verifications
            .lock()
            .unwrap()
            .retain(|_, v| v.user_id != id);
        self.profiles.lock().unwrap().remove(id);

        Ok(())
    }

    async fn list_admins(&self) -> AuthResult<Vec<User>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .values()
            .filter(|u| u.is_admin && u.is_active)
            .cloned()
            .collect())
    }

    // -- email addresses ---------------------------------------------------

    async fn create_email_address(&self, create: CreateEmailAddress) -> AuthResult<EmailAddress> {
        let mut emails = self.email_addresses.lock().unwrap();

        if create.primary {
            for existing in emails.values_mut() {
                if existing.user_id == create.user_id && existing.primary {
                    existing.primary = false;
                    existing.updated_at = Utc::now();
                }
            }
        }

        let now = Utc::now();
        let email = EmailAddress {
            id: Uuid::new_v4().to_string(),
            user_id: create.user_id,
            email: create.email,
            primary: create.primary,
            verified: create.verified,
            created_at: now,
            updated_at: now,
        };
        emails.insert(email.id.clone(), email.clone());
        Ok(email)
    }

    async fn get_primary_email(&self, user_id: &str) -> AuthResult<Option<EmailAddress>> {
        let emails = self.email_addresses.lock().unwrap();
        Ok(emails
            .values()
            .find(|e| e.user_id == user_id && e.primary)
            .cloned())
    }

    async fn set_email_verified(&self, id: &str) -> AuthResult<EmailAddress> {
        let mut emails = self.email_addresses.lock().unwrap();
        let email = emails
            .get_mut(id)
            .ok_or_else(|| AuthError::not_found("Email address not found"))?;
        email.verified = true;
        email.updated_at = Utc::now();
        Ok(email.clone())
    }

    // -- customers ----------------------------------------------------------

    async fn create_customer(&self, create: CreateCustomer) -> AuthResult<Customer> {
        let mut customers = self.customers.lock().unwrap();
        let mut name_index = self.customer_name_index.lock().unwrap();

        let key = norm(&create.name);
        if name_index.contains_key(&key) {
            return Err(AuthError::conflict(
                "A customer with this name already exists",
            ));
        }

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: create.name,
            title: create.title,
            kind: create.kind,
            url: None,
            address: None,
            postal_code: None,
            city: None,
            country: None,
            logo: None,
            role_ids: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        name_index.insert(key, customer.id.clone());
        customers.insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn get_customer_by_id(&self, id: &str) -> AuthResult<Option<Customer>> {
        Ok(self.customers.lock().unwrap().get(id).cloned())
    }

    async fn get_customer_by_name(&self, name: &str) -> AuthResult<Option<Customer>> {
        let id = self
            .customer_name_index
            .lock()
            .unwrap()
            .get(&norm(name))
            .cloned();
        Ok(id.and_then(|id| self.customers.lock().unwrap().get(&id).cloned()))
    }

    async fn update_customer(&self, id: &str, update: UpdateCustomer) -> AuthResult<Customer> {
        let mut customers = self.customers.lock().unwrap();
        let customer = customers
            .get_mut(id)
            .ok_or_else(|| AuthError::not_found("Customer not found"))?;

        if let Some(title) = update.title {
            customer.title = Some(title);
        }
        if let Some(url) = update.url {
            customer.url = Some(url);
        }
        if let Some(address) = update.address {
            customer.address = Some(address);
        }
        if let Some(postal_code) = update.postal_code {
            customer.postal_code = Some(postal_code);
        }
        if let Some(city) = update.city {
            customer.city = Some(city);
        }
        if let Some(country) = update.country {
            customer.country = Some(country);
        }
        if let Some(logo) = update.logo {
            customer.logo = Some(logo);
        }
        if let Some(role_ids) = update.role_ids {
            customer.role_ids = role_ids;
        }
        customer.updated_at = Utc::now();
        Ok(customer.clone())
    }

    // -- memberships ---------------------------------------------------------

    async fn create_customer_user(&self, create: CreateCustomerUser) -> AuthResult<CustomerUser> {
        let mut memberships = self.customer_users.lock().unwrap();

        let duplicate = memberships
            .values()
            .any(|m| m.customer_id == create.customer_id && m.user_id == create.user_id);
        if duplicate {
            return Err(AuthError::conflict(
                "User is already a member of this customer",
            ));
        }

        let now = Utc::now();
        let membership = CustomerUser {
            id: Uuid::new_v4().to_string(),
            customer_id: create.customer_id,
            user_id: create.user_id,
            kind: create.kind,
            status: create.status,
            created_at: now,
            updated_at: now,
        };
        memberships.insert(membership.id.clone(), membership.clone());
        Ok(membership)
    }

    async fn get_customer_user(
        &self,
        customer_id: &str,
        user_id: &str,
    ) -> AuthResult<Option<CustomerUser>> {
        let memberships = self.customer_users.lock().unwrap();
        Ok(memberships
            .values()
            .find(|m| m.customer_id == customer_id && m.user_id == user_id)
            .cloned())
    }

    async fn update_customer_user(
        &self,
        id: &str,
        update: UpdateCustomerUser,
    ) -> AuthResult<CustomerUser> {
        let mut memberships = self.customer_users.lock().unwrap();
        let membership = memberships
            .get_mut(id)
            .ok_or_else(|| AuthError::not_found("Membership not found"))?;

        if let Some(kind) = update.kind {
            membership.kind = kind;
        }
        if let Some(status) = update.status {
            membership.status = status;
        }
        membership.updated_at = Utc::now();
        Ok(membership.clone())
    }

    async fn delete_customer_user(&self, id: &str) -> AuthResult<()> {
        let mut memberships = self.customer_users.lock().unwrap();
        memberships
            .remove(id)
            .ok_or_else(|| AuthError::not_found("Membership not found"))?;
        Ok(())
    }

    async fn list_customer_users(&self, customer_id: &str) -> AuthResult<Vec<CustomerUser>> {
        let memberships = self.customer_users.lock().unwrap();
        let mut result: Vec<CustomerUser> = memberships
            .values()
            .filter(|m| m.customer_id == customer_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(result)
    }

    async fn list_user_memberships(&self, user_id: &str) -> AuthResult<Vec<CustomerUser>> {
        let memberships = self.customer_users.lock().unwrap();
        let mut result: Vec<CustomerUser> = memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(result)
    }

    // -- roles and permissions ----------------------------------------------

    async fn create_permission(&self, create: CreatePermission) -> AuthResult<Permission> {
        if !permission_name_is_valid(&create.name) {
            return Err(AuthError::validation(format!(
                "Invalid permission name: {}",
                create.name
            )));
        }

        let mut permissions = self.permissions.lock().unwrap();
        if permissions.values().any(|p| p.name == create.name) {
            return Err(AuthError::conflict(
                "A permission with this name already exists",
            ));
        }

        let permission = Permission {
            id: Uuid::new_v4().to_string(),
            name: create.name,
            description: create.description,
        };
        permissions.insert(permission.id.clone(), permission.clone());
        Ok(permission)
    }

    async fn get_permission_by_name(&self, name: &str) -> AuthResult<Option<Permission>> {
        let permissions = self.permissions.lock().unwrap();
        Ok(permissions.values().find(|p| p.name == name).cloned())
    }

    async fn create_role(&self, create: CreateRole) -> AuthResult<Role> {
        let permissions = self.permissions.lock().unwrap();
        for name in &create.permissions {
            if !permissions.values().any(|p| &p.name == name) {
                return Err(AuthError::validation(format!(
                    "Unknown permission: {name}"
                )));
            }
        }
        drop(permissions);

        let mut roles = self.roles.lock().unwrap();
        if roles.values().any(|r| r.name == create.name) {
            return Err(AuthError::conflict("A role with this name already exists"));
        }

        let role = Role {
            id: Uuid::new_v4().to_string(),
            name: create.name,
            description: create.description,
            permissions: create.permissions,
        };
        roles.insert(role.id.clone(), role.clone());
        Ok(role)
    }

    async fn get_role_by_id(&self, id: &str) -> AuthResult<Option<Role>> {
        Ok(self.roles.lock().unwrap().get(id).cloned())
    }

    async fn effective_permissions(&self, user_id: &str) -> AuthResult<BTreeSet<String>> {
        let role_ids = {
            let users = self.users.lock().unwrap();
            users
                .get(user_id)
                .ok_or(AuthError::UserNotFound)?
                .role_ids
                .clone()
        };

        let roles = self.roles.lock().unwrap();
        let mut result = BTreeSet::new();
        for role_id in role_ids {
            if let Some(role) = roles.get(&role_id) {
                result.extend(role.permissions.iter().cloned());
            }
        }
        Ok(result)
    }

    // -- messages -------------------------------------------------------------

    async fn create_message(&self, create: CreateMessage) -> AuthResult<Message> {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4().to_string(),
            user_id: create.user_id,
            subject: create.subject,
            body: create.body,
            attachments: create.attachments,
            read: false,
            archived: false,
            created_at: now,
            updated_at: now,
        };
        self.messages
            .lock()
            .unwrap()
            .insert(message.id.clone(), message.clone());
        Ok(message)
    }

    async fn get_message(&self, user_id: &str, id: &str) -> AuthResult<Option<Message>> {
        let messages = self.messages.lock().unwrap();
        Ok(messages
            .get(id)
            .filter(|m| m.user_id == user_id)
            .cloned())
    }

    async fn list_messages(&self, user_id: &str) -> AuthResult<Vec<Message>> {
        let messages = self.messages.lock().unwrap();
        let mut result: Vec<Message> = messages
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn update_message(&self, id: &str, update: UpdateMessage) -> AuthResult<Message> {
        let mut messages = self.messages.lock().unwrap();
        let message = messages
            .get_mut(id)
            .ok_or_else(|| AuthError::not_found("Message not found"))?;

        if let Some(read) = update.read {
            message.read = read;
        }
        if let Some(archived) = update.archived {
            message.archived = archived;
        }
        message.updated_at = Utc::now();
        Ok(message.clone())
    }

    async fn reassign_messages(&self, from_user_id: &str, to_user_id: &str) -> AuthResult<u64> {
        let mut messages = self.messages.lock().unwrap();
        let mut moved = 0;
        for message in messages.values_mut() {
            if message.user_id == from_user_id {
                message.user_id = to_user_id.to_string();
                message.updated_at = Utc::now();
                moved += 1;
            }
        }
        Ok(moved)
    }

    // -- verifications ---------------------------------------------------------

    async fn create_verification(&self, create: CreateVerification) -> AuthResult<Verification> {
        let verification = Verification {
            id: Uuid::new_v4().to_string(),
            user_id: create.user_id,
            purpose: create.purpose,
            value: create.value,
            expires_at: create.expires_at,
            consumed_at: None,
            created_at: Utc::now(),
        };
        self.verifications
            .lock()
            .unwrap()
            .insert(verification.id.clone(), verification.clone());
        Ok(verification)
    }

    async fn get_verification_by_value(
        &self,
        purpose: VerificationPurpose,
        value: &str,
    ) -> AuthResult<Option<Verification>> {
        let verifications = self.verifications.lock().unwrap();
        Ok(verifications
            .values()
            .find(|v| v.purpose == purpose && v.value == value)
            .cloned())
    }

    async fn consume_verification(
        &self,
        purpose: VerificationPurpose,
        value: &str,
    ) -> AuthResult<Option<Verification>> {
        let mut verifications = self.verifications.lock().unwrap();
        let now = Utc::now();

        let found = verifications
            .values_mut()
            .find(|v| v.purpose == purpose && v.value == value && v.is_usable(now));

        match found {
            Some(verification) => {
                verification.consumed_at = Some(now);
                Ok(Some(verification.clone()))
            }
            None => Ok(None),
        }
    }

    // -- sessions ---------------------------------------------------------------

    async fn create_session(&self, create: CreateSession) -> AuthResult<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            token: create.token,
            user_id: create.user_id,
            expires_at: create.expires_at,
            ip_address: create.ip_address,
            user_agent: create.user_agent,
            created_at: now,
            updated_at: now,
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, token: &str) -> AuthResult<Option<Session>> {
        Ok(self.sessions.lock().unwrap().get(token).cloned())
    }

    async fn update_session_expiry(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<()> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get_mut(token) {
            session.expires_at = expires_at;
            session.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_session(&self, token: &str) -> AuthResult<()> {
        self.sessions.lock().unwrap().remove(token);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: &str) -> AuthResult<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_other_user_sessions(
        &self,
        user_id: &str,
        keep_token: &str,
    ) -> AuthResult<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id || s.token == keep_token);
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self) -> AuthResult<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }

    // -- profiles ----------------------------------------------------------------

    async fn upsert_profile(
        &self,
        user_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> AuthResult<()> {
        let mut profiles = self.profiles.lock().unwrap();
        profiles
            .entry(user_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get_profile(&self, user_id: &str, key: &str) -> AuthResult<Option<serde_json::Value>> {
        let profiles = self.profiles.lock().unwrap();
        Ok(profiles
            .get(user_id)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn list_profiles(
        &self,
        user_id: &str,
    ) -> AuthResult<HashMap<String, serde_json::Value>> {
        let profiles = self.profiles.lock().unwrap();
        Ok(profiles.get(user_id).cloned().unwrap_or_default())
    }
}
