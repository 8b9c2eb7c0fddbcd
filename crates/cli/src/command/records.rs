// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard record subcommands: complaints, vendors, tenants, work orders,
//! properties and the overview stats.

use serde_json::json;

use super::finish;
use crate::api::{NewTenant, WorkOrderPayload, WorkOrderUpdate, DEFAULT_LIMIT, DEFAULT_PAGE};
use crate::app::App;

#[derive(Debug, clap::Args)]
pub struct PageArgs {
    #[arg(long, default_value_t = DEFAULT_PAGE)]
    pub page: u32,
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: u32,
}

#[derive(Debug, clap::Args)]
pub struct ComplaintsArgs {
    #[command(subcommand)]
    pub command: ComplaintsCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum ComplaintsCommand {
    /// List complaints.
    List(PageArgs),
    /// Assign a vendor to a complaint.
    AssignVendor {
        #[arg(long)]
        complaint_id: String,
        #[arg(long)]
        vendor_id: String,
    },
    /// Change a complaint's status (e.g. in-progress, completed).
    SetStatus {
        id: String,
        #[arg(long)]
        status: String,
    },
    /// Accept a work order as the assigned vendor.
    Accept { id: String },
    /// Schedule the visit for a complaint.
    Schedule {
        #[arg(long)]
        complaint_id: String,
        /// ISO date.
        #[arg(long)]
        date: String,
    },
}

#[derive(Debug, clap::Args)]
pub struct VendorsArgs {
    #[command(subcommand)]
    pub command: VendorsCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum VendorsCommand {
    List(PageArgs),
}

#[derive(Debug, clap::Args)]
pub struct TenantsArgs {
    #[command(subcommand)]
    pub command: TenantsCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum TenantsCommand {
    List(PageArgs),
    Show { id: String },
    Add(AddTenantArgs),
    Delete { id: String },
}

#[derive(Debug, clap::Args)]
pub struct AddTenantArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub email: String,
    /// Initial password for the tenant account.
    #[arg(long, env = "TENANTDESK_TENANT_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub phone_number: Option<String>,
    #[arg(long)]
    pub property_id: String,
    #[arg(long)]
    pub floor_number: Option<String>,
    #[arg(long)]
    pub apartment_number: Option<String>,
}

impl From<&AddTenantArgs> for NewTenant {
    fn from(a: &AddTenantArgs) -> Self {
        Self {
            first_name: a.first_name.clone(),
            last_name: a.last_name.clone(),
            email: a.email.clone(),
            password: a.password.clone(),
            phone_number: a.phone_number.clone(),
            property_id: a.property_id.clone(),
            floor_number: a.floor_number.clone(),
            apartment_number: a.apartment_number.clone(),
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct WorkOrdersArgs {
    #[command(subcommand)]
    pub command: WorkOrdersCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum WorkOrdersCommand {
    Create(CreateWorkOrderArgs),
    Update(UpdateWorkOrderArgs),
    Show { id: String },
}

#[derive(Debug, clap::Args)]
pub struct CreateWorkOrderArgs {
    /// What needs fixing.
    #[arg(long)]
    pub complain: String,
    #[arg(long)]
    pub category: Option<String>,
    /// low, medium or high.
    #[arg(long)]
    pub urgency: Option<String>,
    #[arg(long)]
    pub property_id: Option<String>,
    /// Tenant the work order is raised for.
    #[arg(long)]
    pub user_id: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct UpdateWorkOrderArgs {
    pub id: String,
    #[arg(long)]
    pub complain: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub urgency: Option<String>,
    #[arg(long)]
    pub property_id: Option<String>,
    #[arg(long)]
    pub user_id: Option<String>,
    /// ISO timestamp.
    #[arg(long)]
    pub eta: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct PropertiesArgs {
    #[command(subcommand)]
    pub command: PropertiesCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum PropertiesCommand {
    /// Remove a vendor from a property.
    RetractVendor {
        #[arg(long)]
        property_id: String,
        #[arg(long)]
        vendor_id: String,
    },
}

pub async fn complaints(app: &App, args: &ComplaintsArgs) -> i32 {
    match &args.command {
        ComplaintsCommand::List(p) => finish(app.api.complaints(p.page, p.limit).await),
        ComplaintsCommand::AssignVendor { complaint_id, vendor_id } => {
            finish(app.api.assign_vendor(complaint_id, vendor_id).await)
        }
        ComplaintsCommand::SetStatus { id, status } => finish(app.api.update_complaint_status(id, status).await),
        ComplaintsCommand::Accept { id } => finish(app.api.accept_work_order(id).await),
        ComplaintsCommand::Schedule { complaint_id, date } => finish(app.api.set_schedule(complaint_id, date).await),
    }
}

pub async fn vendors(app: &App, args: &VendorsArgs) -> i32 {
    match &args.command {
        VendorsCommand::List(p) => finish(app.api.vendors(p.page, p.limit).await),
    }
}

pub async fn tenants(app: &App, args: &TenantsArgs) -> i32 {
    match &args.command {
        TenantsCommand::List(p) => finish(app.api.tenants(p.page, p.limit).await),
        TenantsCommand::Show { id } => finish(app.api.tenant(id).await),
        TenantsCommand::Add(add) => finish(app.api.add_tenant(&NewTenant::from(add)).await),
        TenantsCommand::Delete { id } => {
            finish(app.api.delete_tenant(id).await.map(|()| json!({ "deleted": id })))
        }
    }
}

pub async fn work_orders(app: &App, args: &WorkOrdersArgs) -> i32 {
    match &args.command {
        WorkOrdersCommand::Create(c) => {
            let payload = WorkOrderPayload {
                complain: c.complain.clone(),
                user_id: c.user_id.clone(),
                category: c.category.clone(),
                urgency: c.urgency.clone(),
                property_id: c.property_id.clone(),
            };
            finish(app.api.create_work_order(&payload).await)
        }
        WorkOrdersCommand::Update(u) => {
            let update = WorkOrderUpdate {
                complain: u.complain.clone(),
                category: u.category.clone(),
                urgency: u.urgency.clone(),
                property_id: u.property_id.clone(),
                user_id: u.user_id.clone(),
                eta: u.eta.clone(),
            };
            finish(app.api.update_work_order(&u.id, &update).await)
        }
        WorkOrdersCommand::Show { id } => finish(app.api.work_order(id).await),
    }
}

pub async fn properties(app: &App, args: &PropertiesArgs) -> i32 {
    match &args.command {
        PropertiesCommand::RetractVendor { property_id, vendor_id } => finish(
            app.api
                .retract_vendor(property_id, vendor_id)
                .await
                .map(|()| json!({ "property_id": property_id, "vendor_id": vendor_id, "retracted": true })),
        ),
    }
}

pub async fn dashboard(app: &App) -> i32 {
    finish(app.api.dashboard_stats().await)
}
