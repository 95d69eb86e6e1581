#[derive(Debug)]
pub struct ApiUrls;

impl ApiUrls {
    // Operational
    pub const HEALTH: &'static str = "/health";
    pub const HEALTHZ: &'static str = "/healthz";

    // Users
    pub const USERS: &'static str = "/users";
    pub const USERS_SLASH: &'static str = "/users/";
    pub const USER_BY_ID: &'static str = "/users/:clerk_id";
    pub const USER_BY_CLERK_ID: &'static str = "/users/clerk/:clerk_id";
    pub const USER_ROLE: &'static str = "/users/:clerk_id/role";

    // Auth provider webhook
    pub const WEBHOOKS: &'static str = "/api/webhooks";

    // Admin
    pub const ADMIN_TICKETS: &'static str = "/admin/:clerk_id/tickets";
    pub const ADMIN_TICKETS_ALL: &'static str = "/admin/:clerk_id/tickets/all";
    pub const ADMIN_TICKETS_PENDING: &'static str = "/admin/:clerk_id/tickets/pending";
    pub const ADMIN_TICKET_STATUS: &'static str = "/admin/:clerk_id/tickets/:ticket_id/update-status";
    pub const ADMIN_BAN: &'static str = "/admin/ban/:clerk_id";

    // Tickets
    pub const TICKETS: &'static str = "/tickets";
    pub const TICKETS_BY_USER: &'static str = "/tickets/user/:clerk_id";
    pub const TICKETS_PENDING: &'static str = "/tickets/pending";

    // Chat
    pub const CHAT_MESSAGES: &'static str = "/chat/:ticket_id/messages";

    // Realtime
    pub const REALTIME_CHANNEL: &'static str = "/realtime/:channel";
    pub const WS_CHANNEL: &'static str = "/ws/:channel";

    // Gigs
    pub const GIGS: &'static str = "/gigs";
    pub const GIGS_SLASH: &'static str = "/gigs/";
    pub const GIG_BY_ID: &'static str = "/gigs/:gig_id";
    pub const GIGS_BY_EMPLOYER: &'static str = "/gigs/employer/:clerk_id";
    pub const GIG_REQUEST: &'static str = "/gigs/request";
    pub const GIG_REQUEST_BY_ID: &'static str = "/gigs/request/:request_id";
    pub const GIG_REQUESTS_FOR_GIG: &'static str = "/gigs/gig/:gig_id/requests";
    pub const GIG_ACTIVE_FOR_GIG: &'static str = "/gigs/gig/:gig_id/active";
    pub const GIG_REQUESTS_BY_EMPLOYER: &'static str = "/gigs/requests/employer/:clerk_id";
    pub const GIG_REQUESTS_BY_FREELANCER: &'static str = "/gigs/requests/freelancer/:clerk_id";
    pub const ACTIVE_GIGS_BY_ROLE: &'static str = "/gigs/active/:id/:clerk_id";
    pub const ACTIVE_GIG_MILESTONE: &'static str = "/gigs/active/:id/milestone";
    pub const ACTIVE_GIG_MILESTONE_APPROVE: &'static str =
        "/gigs/active/:id/milestone/:milestone_index/approve";
    pub const ACTIVE_GIG_MILESTONE_REJECT: &'static str =
        "/gigs/active/:id/milestone/:milestone_index/reject";
    pub const ACTIVE_GIG_MILESTONE_LINKS: &'static str = "/gigs/active/:id/milestone-links";

    // Profiles
    pub const BASIC_DETAILS: &'static str = "/user-details/basic";
    pub const BASIC_DETAILS_BY_ID: &'static str = "/user-details/basic/:clerk_id";
    pub const FREELANCER_DETAILS: &'static str = "/user-details/freelancer";
    pub const FREELANCER_DETAILS_BY_ID: &'static str = "/user-details/freelancer/:clerk_id";
    pub const EMPLOYER_DETAILS: &'static str = "/user-details/employer";
    pub const EMPLOYER_DETAILS_BY_ID: &'static str = "/user-details/employer/:clerk_id";

    // Balances
    pub const BALANCE_BY_USER: &'static str = "/balance/user/:clerk_id";
    pub const BALANCE_ADD: &'static str = "/balance/user/:clerk_id/add";
    pub const BALANCE_WITHDRAW: &'static str = "/balance/user/:clerk_id/withdraw";
    pub const BALANCE_COMPANY: &'static str = "/balance/company";

    // Reviews
    pub const REVIEWS: &'static str = "/reviews";
    pub const REVIEWS_SLASH: &'static str = "/reviews/";
}
