use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hostbay API",
        description = "VPS reselling backend: orders, services, instance control, billing"
    ),
    paths(
        crate::orders::create_order,
        crate::services_endpoint::list_services,
        crate::services_endpoint::get_service,
        crate::services_endpoint::control_service,
        crate::services_endpoint::delete_service,
        crate::billing::list_invoices,
        crate::billing::get_balance,
        crate::webhooks::payment_webhook,
    ),
    components(schemas(
        crate::orders::OrderBody,
        crate::orders::OrderResponse,
        crate::services_endpoint::ControlBody,
        crate::services_endpoint::ControlResponse,
        crate::webhooks::PaymentEvent,
        hostbay_common::VpsService,
        hostbay_common::Invoice,
    ))
)]
pub struct ApiDoc;
